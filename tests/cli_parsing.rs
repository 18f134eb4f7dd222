use std::path::PathBuf;

use clap::Parser;
use veer::cli::{Cli, Commands};
use veer::domain::models::Side;

#[test]
fn test_parse_vote_by_position_with_side() {
    let cli = Cli::try_parse_from(vec![
        "veer", "vote", "--stage", "1", "--level", "2", "--order", "1", "--side", "left",
    ])
    .unwrap();

    assert!(!cli.json);
    match cli.command {
        Commands::Vote(args) => {
            assert_eq!(args.poll, None);
            assert_eq!(args.stage, Some(1));
            assert_eq!(args.level, Some(2));
            assert_eq!(args.order, Some(1));
            assert_eq!(args.side, Some(Side::Left));
            assert_eq!(args.pair_with, None);
            assert_eq!(args.option, None);
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_vote_by_poll_prefix_with_option() {
    let cli = Cli::try_parse_from(vec![
        "veer",
        "vote",
        "--poll",
        "550e8400",
        "--option",
        "2",
        "--player",
        "6ba7b810",
    ])
    .unwrap();

    match cli.command {
        Commands::Vote(args) => {
            assert_eq!(args.poll.as_deref(), Some("550e8400"));
            assert_eq!(args.option, Some(2));
            assert_eq!(args.identity.player.as_deref(), Some("6ba7b810"));
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_vote_rejects_unknown_side() {
    let result = Cli::try_parse_from(vec!["veer", "vote", "--poll", "abc", "--side", "up"]);
    assert!(result.is_err());
}

#[test]
fn test_session_path_defaults() {
    let cli = Cli::try_parse_from(vec!["veer", "progress"]).unwrap();
    match cli.command {
        Commands::Progress(args) => {
            assert_eq!(args.identity.session, PathBuf::from(".veer/session.json"));
            assert_eq!(args.identity.player, None);
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_global_json_flag_applies_anywhere() {
    let cli = Cli::try_parse_from(vec!["veer", "metrics", "--json"]).unwrap();
    assert!(cli.json);
    assert!(matches!(cli.command, Commands::Metrics(_)));

    let cli = Cli::try_parse_from(vec!["veer", "--json", "advance"]).unwrap();
    assert!(cli.json);
    assert!(matches!(cli.command, Commands::Advance(_)));
}

#[test]
fn test_parse_init_with_force() {
    let cli = Cli::try_parse_from(vec!["veer", "init", "--force", "/tmp/game"]).unwrap();
    match cli.command {
        Commands::Init(args) => {
            assert!(args.force);
            assert_eq!(args.path, PathBuf::from("/tmp/game"));
        }
        _ => panic!("Wrong top-level command"),
    }

    let cli = Cli::try_parse_from(vec!["veer", "init"]).unwrap();
    match cli.command {
        Commands::Init(args) => {
            assert!(!args.force);
            assert_eq!(args.path, PathBuf::from("."));
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_import_takes_a_file() {
    let cli = Cli::try_parse_from(vec!["veer", "import", "catalog.yaml"]).unwrap();
    match cli.command {
        Commands::Import(args) => assert_eq!(args.file, PathBuf::from("catalog.yaml")),
        _ => panic!("Wrong top-level command"),
    }

    assert!(Cli::try_parse_from(vec!["veer", "import"]).is_err());
}

#[test]
fn test_parse_player_subcommands() {
    use veer::cli::commands::player::PlayerCommands;

    let cli = Cli::try_parse_from(vec!["veer", "player", "new"]).unwrap();
    match cli.command {
        Commands::Player(args) => assert!(matches!(args.command, PlayerCommands::New)),
        _ => panic!("Wrong top-level command"),
    }

    let cli = Cli::try_parse_from(vec!["veer", "player", "show", "550e8400"]).unwrap();
    match cli.command {
        Commands::Player(args) => match args.command {
            PlayerCommands::Show { id } => assert_eq!(id, "550e8400"),
            PlayerCommands::New => panic!("Wrong player command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_render_template() {
    let cli = Cli::try_parse_from(vec![
        "veer",
        "render",
        "Score so far: [[PointTotal]]",
        "--player",
        "abc123",
    ])
    .unwrap();
    match cli.command {
        Commands::Render(args) => {
            assert_eq!(args.text, "Score so far: [[PointTotal]]");
            assert_eq!(args.identity.player.as_deref(), Some("abc123"));
        }
        _ => panic!("Wrong top-level command"),
    }
}
