use std::fs::write;
use std::path::PathBuf;

use drive_merge::load_config::{load_config, Overrides};
use tempfile::NamedTempFile;

fn write_config(content: &[u8]) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Creating temp config file failed");
    write(file.path(), content).expect("Writing temp config failed");
    file
}

#[test]
fn full_config_file_is_parsed() {
    let config = write_config(
        b"merge:\n  folder_id: \"abc123\"\n  token: \"creds/token.json\"\n  output_name: \"result.pdf\"\n  move_to_root: true\n  clean_chunks: true\n  delete_chunks_folder: true\n  root_folder_name: \"MyApp\"\n  pdf_folder_name: \"archive\"\n  webhook_url: \"https://script.example/exec\"\n  merge_token: \"s3cret\"\n",
    );

    let settings = load_config(config.path(), Overrides::default()).expect("config should load");
    assert_eq!(settings.options.folder_id, "abc123");
    assert_eq!(settings.token_path, PathBuf::from("creds/token.json"));
    assert_eq!(settings.options.output_name.as_deref(), Some("result.pdf"));
    assert!(settings.options.move_to_root);
    assert!(settings.options.clean_chunks);
    assert!(settings.options.delete_folder);
    assert_eq!(settings.options.root_folder_name, "MyApp");
    assert_eq!(settings.options.pdf_folder_name, "archive");
    let webhook = settings.webhook.expect("webhook configured");
    assert_eq!(webhook.url, "https://script.example/exec");
    assert_eq!(webhook.token, "s3cret");
}

#[test]
fn cli_overrides_take_precedence_over_the_file() {
    let config = write_config(b"merge:\n  folder_id: \"from-file\"\n  output_name: \"file.pdf\"\n");
    let overrides = Overrides {
        folder_id: Some("from-flag".to_string()),
        output_name: Some("flag.pdf".to_string()),
        clean_chunks: true,
        ..Overrides::default()
    };
    let settings = load_config(config.path(), overrides).expect("config should load");
    assert_eq!(settings.options.folder_id, "from-flag");
    assert_eq!(settings.options.output_name.as_deref(), Some("flag.pdf"));
    assert!(settings.options.clean_chunks);
}

#[test]
fn missing_folder_id_is_an_error() {
    let config = write_config(b"merge:\n  clean_chunks: true\n");
    let err = load_config(config.path(), Overrides::default()).unwrap_err();
    assert!(err.to_string().contains("Missing folder id"));
}

#[test]
fn defaults_apply_when_keys_are_absent() {
    let config = write_config(b"merge:\n  folder_id: \"abc\"\n");
    let settings = load_config(config.path(), Overrides::default()).expect("config should load");
    assert_eq!(settings.token_path, PathBuf::from("token.json"));
    assert_eq!(settings.options.root_folder_name, "Rememly");
    assert_eq!(settings.options.pdf_folder_name, "pdf");
    assert!(settings.options.save_local.is_none());
    assert!(!settings.options.move_to_root);
    assert!(settings.webhook.is_none());
}

#[test]
fn webhook_requires_both_url_and_token() {
    let config = write_config(
        b"merge:\n  folder_id: \"abc\"\n  webhook_url: \"https://script.example/exec\"\n",
    );
    let settings = load_config(config.path(), Overrides::default()).expect("config should load");
    assert!(settings.webhook.is_none());
}

#[test]
fn skip_notify_disables_a_configured_webhook() {
    let config = write_config(
        b"merge:\n  folder_id: \"abc\"\n  webhook_url: \"https://script.example/exec\"\n  merge_token: \"s3cret\"\n",
    );
    let overrides = Overrides {
        skip_notify: true,
        ..Overrides::default()
    };
    let settings = load_config(config.path(), overrides).expect("config should load");
    assert!(settings.webhook.is_none());
}

#[test]
fn missing_config_file_falls_back_to_flags() {
    let overrides = Overrides {
        folder_id: Some("flag-folder".to_string()),
        ..Overrides::default()
    };
    let settings = load_config(
        std::path::Path::new("definitely-not-here.yaml"),
        overrides,
    )
    .expect("flags alone should be enough");
    assert_eq!(settings.options.folder_id, "flag-folder");
}
