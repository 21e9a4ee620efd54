use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), DEFAULT_PUBLIC_PORT);
    assert_eq!(settings.server.admin_addr.port(), DEFAULT_ADMIN_PORT);
    assert!(settings.backend.url.is_none());
    assert_eq!(settings.backend.timeout(), Duration::from_secs(5));
    assert_eq!(settings.probe.ttl(), Duration::from_secs(30));
    assert_eq!(settings.cache.capacity, 512);
    assert!(settings.cache.stale_while_revalidate);
    assert_eq!(
        settings.resolver.fallback_policy,
        FallbackPolicy::EmptyFallsBackToStatic
    );
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        public_port: Some(4321),
        probe_ttl_seconds: Some(5),
        ..Default::default()
    };
    let source = SourceOverrides {
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    raw.apply_source_overrides(&source);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.probe.ttl(), Duration::from_secs(5));
}

#[test]
fn offline_flag_discards_configured_backend() {
    let mut raw = RawSettings::default();
    raw.backend.url = Some("https://db.example.com".to_string());

    raw.apply_source_overrides(&SourceOverrides {
        offline: true,
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(settings.backend.url.is_none());
}

#[test]
fn blank_backend_url_means_static_only() {
    let mut raw = RawSettings::default();
    raw.backend.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.backend.url.is_none());
}

#[test]
fn invalid_values_name_their_key() {
    let mut raw = RawSettings::default();
    raw.backend.url = Some("ftp://db.example.com".to_string());
    let err = Settings::from_raw(raw).expect_err("bad scheme");
    assert!(matches!(err, LoadError::Invalid { key: "backend.url", .. }));

    let mut raw = RawSettings::default();
    raw.cache.capacity = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero capacity");
    assert!(matches!(err, LoadError::Invalid { key: "cache.capacity", .. }));

    let mut raw = RawSettings::default();
    raw.backend.timeout_ms = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero timeout");
    assert!(matches!(err, LoadError::Invalid { key: "backend.timeout_ms", .. }));
}

#[test]
fn listeners_must_not_collide() {
    let mut raw = RawSettings::default();
    raw.server.admin_port = Some(DEFAULT_PUBLIC_PORT);
    let err = Settings::from_raw(raw).expect_err("same address");
    assert!(matches!(err, LoadError::Invalid { key: "server.admin_port", .. }));
}

#[test]
fn fallback_policy_deserializes_snake_case() {
    let raw: RawResolverSettings =
        serde_json::from_str(r#"{"fallback_policy":"dynamic_is_authoritative"}"#)
            .expect("policy");
    assert_eq!(
        raw.fallback_policy,
        Some(FallbackPolicy::DynamicIsAuthoritative)
    );
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
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["folio"]);
    assert!(args.command.is_none());
}

#[test]
fn parse_posts_list_arguments() {
    let args = CliArgs::parse_from([
        "folio",
        "posts",
        "list",
        "--tags",
        "go,rust",
        "--limit",
        "5",
        "--offline",
    ]);

    assert!(args.source.offline);
    match args.command.expect("posts command") {
        Command::Posts(PostsArgs {
            command: PostsCommand::List(list),
        }) => {
            assert_eq!(list.tags, vec!["go".to_string(), "rust".to_string()]);
            assert_eq!(list.limit, Some(5));
            assert_eq!(list.offset, 0);
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn parse_posts_show_arguments() {
    let args = CliArgs::parse_from([
        "folio",
        "--backend-url",
        "https://db.example.com",
        "posts",
        "show",
        "hello-world",
        "--include-unpublished",
    ]);

    assert_eq!(
        args.source.backend_url.as_deref(),
        Some("https://db.example.com")
    );
    match args.command.expect("posts command") {
        Command::Posts(PostsArgs {
            command: PostsCommand::Show(show),
        }) => {
            assert_eq!(show.slug, "hello-world");
            assert!(show.include_unpublished);
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn parse_snapshot_check_arguments() {
    let args = CliArgs::parse_from(["folio", "snapshot", "check", "/tmp/snapshot.json"]);

    match args.command.expect("snapshot command") {
        Command::Snapshot(SnapshotArgs {
            command: SnapshotCommand::Check(check),
        }) => {
            assert_eq!(
                check.file.as_deref(),
                Some(std::path::Path::new("/tmp/snapshot.json"))
            );
        }
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
#[serial_test::serial]
fn environment_overrides_files_and_cli_overrides_environment() {
    // SAFETY: serialized with every other test touching the environment.
    unsafe {
        std::env::set_var("FOLIO__PROBE__TTL_SECONDS", "7");
        std::env::set_var("FOLIO__LOGGING__LEVEL", "warn");
    }

    let args = CliArgs::parse_from(["folio", "--log-level", "trace", "tags"]);
    let loaded = load(&args);

    unsafe {
        std::env::remove_var("FOLIO__PROBE__TTL_SECONDS");
        std::env::remove_var("FOLIO__LOGGING__LEVEL");
    }

    let settings = loaded.expect("settings load");
    assert_eq!(settings.probe.ttl(), Duration::from_secs(7));
    assert_eq!(settings.logging.level, LevelFilter::TRACE);
    assert_eq!(settings.cache.capacity, 512);
}
