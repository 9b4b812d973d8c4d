// Domain layer: records, file handles and the storage ports. No storage engine code here.

pub mod model;
pub mod ports;
