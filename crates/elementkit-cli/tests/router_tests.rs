//! Command-line parsing tests

use std::path::PathBuf;

use clap::Parser;
use elementkit_cli::router::{Cli, Commands, PolicyArg};
use elementkit_images::CachePolicy;

#[test]
fn test_parse_fetch_defaults() {
    let cli = Cli::parse_from(["elementkit", "fetch", "https://example.com/a.png"]);
    match cli.command {
        Commands::Fetch {
            locator,
            key,
            policy,
            max_dimension,
            out,
        } => {
            assert_eq!(locator, "https://example.com/a.png");
            assert_eq!(key, None);
            assert_eq!(policy, PolicyArg::Cached);
            assert_eq!(max_dimension, None);
            assert_eq!(out, None);
        }
        other => panic!("Expected Fetch command, got {other:?}"),
    }
    assert!(!cli.verbose);
}

#[test]
fn test_parse_fetch_all_options() {
    let cli = Cli::parse_from([
        "elementkit",
        "fetch",
        "/tmp/photo.jpg",
        "--key",
        "profile",
        "--policy",
        "reload",
        "--max-dimension",
        "128",
        "--out",
        "thumb.jpg",
        "--cache-dir",
        "/tmp/cache",
        "--verbose",
    ]);

    assert!(cli.verbose);
    assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/cache")));
    if let Commands::Fetch {
        key,
        policy,
        max_dimension,
        out,
        ..
    } = cli.command
    {
        assert_eq!(key.as_deref(), Some("profile"));
        assert_eq!(CachePolicy::from(policy), CachePolicy::Reload);
        assert_eq!(max_dimension, Some(128));
        assert_eq!(out, Some(PathBuf::from("thumb.jpg")));
    } else {
        panic!("Expected Fetch command");
    }
}

#[test]
fn test_parse_config_with_global_file() {
    let cli = Cli::parse_from(["elementkit", "config", "--config", "images.yaml"]);
    assert!(matches!(cli.command, Commands::Config));
    assert_eq!(cli.config, Some(PathBuf::from("images.yaml")));
}

#[test]
fn test_rejects_unknown_policy() {
    let result = Cli::try_parse_from(["elementkit", "fetch", "a.png", "--policy", "sometimes"]);
    assert!(result.is_err());
}

#[test]
fn test_requires_subcommand() {
    assert!(Cli::try_parse_from(["elementkit"]).is_err());
}
