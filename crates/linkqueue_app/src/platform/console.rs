//! Line-oriented console input. Anything that is not a known command is
//! treated as pasted URLs.

use chrono::{DateTime, Utc};
use linkqueue_core::Msg;

pub const HELP: &str = "\
commands:
  <url lines>        stage URLs for the next start
  start | stop       start or stop the queue
  clear              remove every queue item
  skip               end the current break
  break <minutes>    set the break to end in <minutes>
  move <from> <to>   reorder (1-based positions)
  jump <n>           run item <n> next
  delete <n>         remove item <n>
  grab               save the profiles on the current page
  page | page stop   run or stop a single-page extraction
  export [path]      write all records to CSV
  push               upload all records
  notify             toggle in-page notifications
  list               show or fold the full queue list
  status             refresh now
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Msg(Msg),
    QuickExtract,
    SinglePage { start: bool },
    Help,
    Quit,
    Invalid(String),
}

pub fn parse_line(line: &str, now: DateTime<Utc>, default_export: &str) -> ConsoleInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleInput::Msg(Msg::NoOp);
    }
    let mut words = trimmed.split_whitespace();
    let head = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let msg = match (head.as_str(), args.as_slice()) {
        ("start", []) => Msg::StartClicked,
        ("stop", []) => Msg::StopClicked,
        ("clear", []) => Msg::ClearClicked,
        ("skip", []) => Msg::SkipBreakClicked,
        ("push", []) => Msg::PushRequested,
        ("notify", []) => Msg::NotificationsToggled,
        ("list", []) => Msg::QueueExpandToggled,
        ("status", []) => Msg::Tick,
        ("help", []) => return ConsoleInput::Help,
        ("quit" | "exit", []) => return ConsoleInput::Quit,
        ("grab", []) => return ConsoleInput::QuickExtract,
        ("page", []) => return ConsoleInput::SinglePage { start: true },
        ("page", ["stop"]) => return ConsoleInput::SinglePage { start: false },
        ("export", []) => Msg::ExportRequested {
            path: default_export.to_string(),
        },
        ("export", [path]) => Msg::ExportRequested {
            path: (*path).to_string(),
        },
        ("break", [minutes]) => match minutes.parse::<i64>() {
            Ok(minutes) => Msg::BreakMinutesEntered { minutes, now },
            Err(_) => return ConsoleInput::Invalid(format!("not a number: {minutes}")),
        },
        ("jump", [n]) => match position(n) {
            Ok(index) => Msg::JumpRequested(index),
            Err(err) => return ConsoleInput::Invalid(err),
        },
        ("delete", [n]) => match position(n) {
            Ok(index) => Msg::DeleteRequested(index),
            Err(err) => return ConsoleInput::Invalid(err),
        },
        ("move", [from, to]) => match (position(from), position(to)) {
            (Ok(from), Ok(to)) => Msg::MoveRequested { from, to },
            (Err(err), _) | (_, Err(err)) => return ConsoleInput::Invalid(err),
        },
        _ if trimmed.contains("://") || trimmed.contains('/') => Msg::UrlsPasted(trimmed.to_string()),
        _ => return ConsoleInput::Invalid(format!("unknown command: {trimmed}")),
    };
    ConsoleInput::Msg(msg)
}

/// Converts a 1-based position typed by the user to an index.
fn position(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("not a queue position: {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn parse(line: &str) -> ConsoleInput {
        parse_line(line, now(), "connections.csv")
    }

    #[test]
    fn commands_become_messages() {
        assert_eq!(parse("start"), ConsoleInput::Msg(Msg::StartClicked));
        assert_eq!(parse("  STOP "), ConsoleInput::Msg(Msg::StopClicked));
        assert_eq!(
            parse("break 10"),
            ConsoleInput::Msg(Msg::BreakMinutesEntered {
                minutes: 10,
                now: now()
            })
        );
        assert_eq!(
            parse("move 3 1"),
            ConsoleInput::Msg(Msg::MoveRequested { from: 2, to: 0 })
        );
        assert_eq!(parse("delete 1"), ConsoleInput::Msg(Msg::DeleteRequested(0)));
        assert_eq!(
            parse("export"),
            ConsoleInput::Msg(Msg::ExportRequested {
                path: "connections.csv".into()
            })
        );
        assert_eq!(parse("page stop"), ConsoleInput::SinglePage { start: false });
        assert_eq!(parse("grab"), ConsoleInput::QuickExtract);
        assert_eq!(parse("list"), ConsoleInput::Msg(Msg::QueueExpandToggled));
        assert_eq!(parse("quit"), ConsoleInput::Quit);
    }

    #[test]
    fn url_lines_are_staged() {
        let line = "https://www.linkedin.com/in/someone/";
        assert_eq!(parse(line), ConsoleInput::Msg(Msg::UrlsPasted(line.into())));
    }

    #[test]
    fn bad_positions_and_words_are_rejected() {
        assert!(matches!(parse("jump 0"), ConsoleInput::Invalid(_)));
        assert!(matches!(parse("move x 2"), ConsoleInput::Invalid(_)));
        assert!(matches!(parse("break soon"), ConsoleInput::Invalid(_)));
        assert!(matches!(parse("frobnicate"), ConsoleInput::Invalid(_)));
        assert_eq!(parse(""), ConsoleInput::Msg(Msg::NoOp));
    }
}
