//! Console command surface.
//!
//! Stands in for the host chat platform so the bot can be driven without
//! a live connection: each stdin line is `<user> <command> [args...]`,
//! translated into an [`Intent`] and dispatched.

use std::sync::Arc;

use gatekeeper_common::UserId;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::MemoryPlatform;
use crate::bot::Bot;
use crate::intent::Intent;

const USAGE: &str = "commands: verify | answer <code> | help | panel | ping | \
                     stock | add <service> <email:pass>... | gen <service> | \
                     clear [service] | backup | press <component-id> | \
                     modal <component-id> <input> | quit";

/// Translate one console line's command words into an intent
fn parse_command(words: &[&str]) -> Option<Intent> {
    match words {
        ["verify"] => Some(Intent::StartVerification),
        ["answer"] => Some(Intent::ShowAnswerModal),
        ["answer", code] => Some(Intent::SubmitAnswer {
            answer: code.to_string(),
        }),
        ["help"] => Some(Intent::ShowHelp),
        ["panel"] => Some(Intent::PublishPanel),
        ["ping"] => Some(Intent::Ping),
        ["stock"] => Some(Intent::ViewStock),
        ["add", service, entries @ ..] if !entries.is_empty() => Some(Intent::AddStock {
            service: service.parse().ok()?,
            entries: entries.iter().map(|s| s.to_string()).collect(),
        }),
        ["gen", service] => Some(Intent::Generate {
            service: service.parse().ok()?,
        }),
        ["clear"] => Some(Intent::ClearStock { service: None }),
        ["clear", service] => Some(Intent::ClearStock {
            service: Some(service.parse().ok()?),
        }),
        ["backup"] => Some(Intent::BackupStock),
        // Raw component events, exactly as the host platform would emit them
        ["press", custom_id] => Intent::from_component(custom_id),
        ["modal", custom_id, input] => Intent::from_modal(custom_id, input),
        _ => None,
    }
}

/// Read console commands until EOF, `quit`, or shutdown.
pub async fn run_console_loop(
    bot: Arc<Bot>,
    platform: Arc<MemoryPlatform>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    println!("gatekeeper console — <user> <command>; {USAGE}");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.recv() => {
                tracing::info!("Console loop shutting down");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(error = %error, "stdin read failed");
                break;
            }
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        let [user, command @ ..] = words.as_slice() else {
            continue;
        };
        if *user == "quit" || command == ["quit"] {
            break;
        }

        let Some(intent) = parse_command(command) else {
            println!("? {USAGE}");
            continue;
        };

        let user = UserId::from(*user);
        if !platform.is_member(&user) {
            platform.join(user.clone());
        }

        for notice in bot.handle(&user, intent).await {
            println!("-> {:?} {} — {}", notice.kind, notice.title, notice.body);
            for (name, value) in &notice.fields {
                println!("   {name}: {value}");
            }
            if let Some(image) = &notice.image_ref {
                println!("   image: {image}");
            }
        }
    }

    tracing::info!(
        deliveries = platform.deliveries().len(),
        kicked = platform.kicked_users().len(),
        "Console session summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_common::Service;

    #[test]
    fn verification_commands_parse() {
        assert_eq!(parse_command(&["verify"]), Some(Intent::StartVerification));
        assert_eq!(
            parse_command(&["answer", "abc1"]),
            Some(Intent::SubmitAnswer {
                answer: "abc1".to_string()
            })
        );
    }

    #[test]
    fn stock_commands_parse_with_services() {
        assert_eq!(
            parse_command(&["gen", "roblox"]),
            Some(Intent::Generate {
                service: Service::Roblox
            })
        );
        assert_eq!(
            parse_command(&["add", "epic", "a@x.com:pw"]),
            Some(Intent::AddStock {
                service: Service::Epic,
                entries: vec!["a@x.com:pw".to_string()],
            })
        );
        assert_eq!(
            parse_command(&["clear", "steam"]),
            Some(Intent::ClearStock {
                service: Some(Service::Steam)
            })
        );
    }

    #[test]
    fn raw_component_events_decode_like_the_platform() {
        assert_eq!(
            parse_command(&["press", "verify:start"]),
            Some(Intent::StartVerification)
        );
        assert_eq!(
            parse_command(&["modal", "verify:modal", "abc1"]),
            Some(Intent::SubmitAnswer {
                answer: "abc1".to_string()
            })
        );
        assert_eq!(parse_command(&["press", "verify:bogus"]), None);
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert_eq!(parse_command(&["add", "origin", "a:b"]), None);
        assert_eq!(parse_command(&["frobnicate"]), None);
        assert_eq!(parse_command(&[]), None);
    }
}
