use clap::Parser;
use draft_store::adapters::file_source::extension_for;
use draft_store::utils::error::{DraftStoreError, ErrorSeverity};
use draft_store::utils::{logger, validation::Validate};
use draft_store::{CliConfig, Command, DraftFileStore, LocalFile, StoreConfig};
use std::path::Path;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    let mut config = match &cli.config {
        Some(path) => match StoreConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path.display(), e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => StoreConfig::default(),
    };
    cli.apply_overrides(&mut config);

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger(config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose, config.log_level());
    }
    tracing::debug!("CLI config: {:?}", cli);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let result = match config.build_store() {
        Ok(store) => run(&cli.command, &store).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(
                "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(error_exit_code(&cli.command, e.severity()));
        }
    }
}

/// Exit code for a failed command. `has` reserves 1 for "no files", so its
/// errors never exit below 2.
fn error_exit_code(command: &Command, severity: ErrorSeverity) -> i32 {
    let code = match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    match command {
        Command::Has { .. } => code.max(2),
        _ => code,
    }
}

async fn run(command: &Command, store: &DraftFileStore) -> draft_store::Result<i32> {
    match command {
        Command::Put {
            draft_id,
            field_name,
            files,
            index,
            content_type,
        } => {
            let sources: Vec<LocalFile> = files
                .iter()
                .map(|path| {
                    let file = LocalFile::new(path);
                    match content_type {
                        Some(content_type) => file.with_content_type(content_type.as_str()),
                        None => file,
                    }
                })
                .collect();

            match (index, sources.as_slice()) {
                (Some(index), [file]) => {
                    store.save_file(draft_id, field_name, file, Some(*index)).await?;
                    println!(
                        "✅ Saved {} to {}/{}[{}]",
                        file.path().display(),
                        draft_id,
                        field_name,
                        index
                    );
                }
                (Some(_), _) => {
                    return Err(DraftStoreError::ConfigError {
                        message: "--index takes exactly one file".to_string(),
                    });
                }
                (None, sources) => {
                    store.save_files(draft_id, field_name, sources).await?;
                    println!(
                        "✅ Saved {} file(s) to {}/{}",
                        sources.len(),
                        draft_id,
                        field_name
                    );
                }
            }
            Ok(0)
        }
        Command::Ls { draft_id, json } => {
            let files = store.load_files(draft_id).await?;
            if *json {
                let listing: serde_json::Map<String, serde_json::Value> = files
                    .iter()
                    .map(|(field, files)| {
                        let entries = files
                            .iter()
                            .enumerate()
                            .map(|(position, file)| {
                                serde_json::json!({
                                    "position": position,
                                    "name": file.name,
                                    "content_type": file.content_type,
                                    "bytes": file.size(),
                                })
                            })
                            .collect();
                        (field.clone(), serde_json::Value::Array(entries))
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else if files.is_empty() {
                println!("No files stored for draft {}", draft_id);
            } else {
                for (field, files) in &files {
                    println!("{} ({} file(s))", field, files.len());
                    for (position, file) in files.iter().enumerate() {
                        println!(
                            "  [{}] {}  {}  {} bytes",
                            position,
                            file.name,
                            file.content_type,
                            file.size()
                        );
                    }
                }
            }
            Ok(0)
        }
        Command::Export { draft_id, dir } => {
            let files = store.load_files(draft_id).await?;
            let mut written = 0usize;
            for (field, files) in &files {
                let field_dir = dir.join(sanitize_component(field));
                tokio::fs::create_dir_all(&field_dir).await?;
                for (position, file) in files.iter().enumerate() {
                    let target =
                        field_dir.join(export_file_name(position, &file.name, &file.content_type));
                    tokio::fs::write(&target, &file.data).await?;
                    tracing::debug!("Exported {}", target.display());
                    written += 1;
                }
            }
            println!("📁 Exported {} file(s) to {}", written, dir.display());
            Ok(0)
        }
        Command::Rm { draft_id, field } => {
            let removed = match field {
                Some(field) => store.delete_field_files(draft_id, field).await?,
                None => store.delete_draft_files(draft_id).await?,
            };
            println!("🗑️  Removed {} file(s)", removed);
            Ok(0)
        }
        Command::Has { draft_id } => {
            if store.has_files(draft_id).await? {
                println!("yes");
                Ok(0)
            } else {
                println!("no");
                Ok(1)
            }
        }
        Command::Drafts { json } => {
            let drafts = store.list_drafts().await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&drafts)?);
                return Ok(0);
            }
            if drafts.is_empty() {
                println!("No drafts stored");
            }
            for draft in drafts {
                println!(
                    "{}  {} file(s)  {} bytes",
                    draft.draft_id, draft.file_count, draft.total_bytes
                );
            }
            Ok(0)
        }
        Command::Wipe { yes } => {
            if !*yes {
                eprintln!("⚠️  This deletes every stored draft file. Re-run with --yes to confirm.");
                return Ok(1);
            }
            let removed = store.delete_all_files().await?;
            println!("🗑️  Removed {} file(s)", removed);
            Ok(0)
        }
    }
}

/// Turn an opaque id into one path component. Distinct ids give distinct
/// components: separators, `%` and dot-only names are percent-encoded.
fn sanitize_component(value: &str) -> String {
    match value {
        "" => return "%".to_string(),
        "." => return "%2E".to_string(),
        ".." => return "%2E%2E".to_string(),
        _ => {}
    }
    let mut encoded = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '/' | '\\' | '\0' | ':' | '%' => encoded.push_str(&format!("%{:02X}", c as u32)),
            c => encoded.push(c),
        }
    }
    encoded
}

fn export_file_name(position: usize, name: &str, content_type: &str) -> String {
    let mut file_name = format!("{}-{}", position, sanitize_component(name));
    if Path::new(name).extension().is_none() {
        if let Some(ext) = extension_for(content_type) {
            file_name.push('.');
            file_name.push_str(ext);
        }
    }
    file_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("section-0"), "section-0");
        assert_eq!(sanitize_component("../etc/passwd"), "..%2Fetc%2Fpasswd");
        assert_eq!(sanitize_component(".."), "%2E%2E");
        assert_eq!(sanitize_component(""), "%");
    }

    #[test]
    fn test_sanitize_component_keeps_fields_apart() {
        let fields = ["a/b", "a_b", "a%2Fb", "a:b", "a\\b", ".", "%2E", "", "%"];
        let encoded: std::collections::HashSet<String> =
            fields.iter().map(|f| sanitize_component(f)).collect();
        assert_eq!(encoded.len(), fields.len());
    }

    #[test]
    fn test_has_errors_exit_apart_from_no_files() {
        let has = Command::Has {
            draft_id: "d1".to_string(),
        };
        let drafts = Command::Drafts { json: false };

        assert_eq!(error_exit_code(&drafts, ErrorSeverity::High), 1);
        assert_eq!(error_exit_code(&has, ErrorSeverity::High), 2);
        assert_eq!(error_exit_code(&has, ErrorSeverity::Low), 2);
        assert_eq!(error_exit_code(&has, ErrorSeverity::Critical), 3);
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name(0, "front.jpg", "image/jpeg"), "0-front.jpg");
        assert_eq!(export_file_name(2, "blob", "image/png"), "2-blob.png");
        assert_eq!(export_file_name(1, "blob", "application/x-thing"), "1-blob");
    }
}
