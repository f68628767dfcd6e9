use super::*;

#[test]
fn defaults_are_applied() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:5000");
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.uploads.directory, PathBuf::from("uploads"));
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
    assert_eq!(settings.auth.username, "admin");
    assert!(settings.auth.password_sha256.is_none());
    assert_eq!(settings.site.title, "Flog");
    assert!(settings.site.categories.is_empty());
    assert_eq!(settings.site.entries_per_page.get(), 5);
    assert_eq!(settings.site.public_url, "http://127.0.0.1:5000/");
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.site.title = Some("From file".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        site_title: Some("From CLI".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.site.title, "From CLI");
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn log_directives_are_validated() {
    let mut raw = RawSettings::default();
    raw.logging.directives = Some(vec![" flog::http=debug ".to_string()]);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.logging.directives, ["flog::http=debug"]);

    let mut raw = RawSettings::default();
    raw.logging.directives = Some(vec!["flog=loud".to_string()]);
    let err = Settings::from_raw(raw).expect_err("bad directive");
    assert!(err.to_string().contains("logging.directives"));
}

#[test]
fn zero_request_limit_is_rejected() {
    let mut raw = RawSettings::default();
    raw.uploads.max_request_bytes = Some(0);

    let err = Settings::from_raw(raw).expect_err("invalid limit");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "uploads.max_request_bytes",
            ..
        }
    ));
}

#[test]
fn password_digest_must_be_sha256_hex() {
    let mut raw = RawSettings::default();
    raw.auth.password_sha256 = Some("abc".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.auth.password_sha256 = Some(
        "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b".to_string(),
    );
    let settings = Settings::from_raw(raw).expect("valid digest");
    assert_eq!(
        settings.auth.password_sha256.as_deref().map(<[u8]>::len),
        Some(32)
    );
}

#[test]
fn session_lifetime_defaults_to_twelve_hours() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert_eq!(settings.auth.session_ttl, time::Duration::hours(12));

    let mut raw = RawSettings::default();
    raw.auth.session_ttl_minutes = Some(30);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.auth.session_ttl, time::Duration::minutes(30));

    let mut raw = RawSettings::default();
    raw.auth.session_ttl_minutes = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero lifetime");
    assert!(err.to_string().contains("auth.session_ttl_minutes"));
}

#[test]
fn categories_are_trimmed_and_deduplicated() {
    let mut raw = RawSettings::default();
    raw.site.categories = Some(vec![
        " Essays ".to_string(),
        "Notes".to_string(),
        "Essays".to_string(),
    ]);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.site.categories, ["Essays", "Notes"]);

    let mut raw = RawSettings::default();
    raw.site.categories = Some(vec!["  ".to_string()]);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn public_url_is_normalized_and_listing_sizes_checked() {
    let mut raw = RawSettings::default();
    raw.site.public_url = Some("https://blog.example.org//".to_string());
    raw.site.entries_in_feed = Some(12);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.site.public_url, "https://blog.example.org/");
    assert_eq!(settings.site.entries_in_feed.get(), 12);

    let mut raw = RawSettings::default();
    raw.site.public_url = Some("blog.example.org".to_string());
    let err = Settings::from_raw(raw).expect_err("relative url");
    assert!(err.to_string().contains("site.public_url"));

    let mut raw = RawSettings::default();
    raw.site.entries_per_page = Some(0);
    let err = Settings::from_raw(raw).expect_err("empty pages");
    assert!(err.to_string().contains("site.entries_per_page"));
}

#[test]
fn invalid_host_is_reported() {
    let mut raw = RawSettings::default();
    raw.server.host = Some("not a host".to_string());
    let err = Settings::from_raw(raw).expect_err("invalid host");
    assert!(err.to_string().contains("server.addr"));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["flog"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "flog",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--server-port",
        "8080",
        "--log-json",
        "true",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.server_port, Some(8080));
            assert_eq!(serve.overrides.log_json, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_hash_password_arguments() {
    let args = CliArgs::parse_from(["flog", "hash-password", "hunter2"]);
    match args.command.expect("hash-password command") {
        Command::HashPassword(hash) => assert_eq!(hash.password, "hunter2"),
        _ => panic!("wrong command parsed"),
    }
}
