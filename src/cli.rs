//! Command-line interface and REPL
//!
//! The REPL runs on its own thread (readline blocks) and forwards control
//! commands to the async main loop over a channel.

use colored::Colorize;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::warn;

use crate::engine::EngineStatus;

/// Control-surface commands accepted by the REPL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Enable,
    Disable,
    Toggle,
    Lock,
    Unlock,
    Backpack,
    Panic,
    Status,
    Quit,
}

/// Parse a REPL line into a command.
pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "enable" | "on" => Some(Command::Enable),
        "disable" | "off" => Some(Command::Disable),
        "toggle" => Some(Command::Toggle),
        "lock" => Some(Command::Lock),
        "unlock" => Some(Command::Unlock),
        "backpack" | "bp" => Some(Command::Backpack),
        "panic" => Some(Command::Panic),
        "status" | "st" => Some(Command::Status),
        "quit" | "exit" | "q" => Some(Command::Quit),
        _ => None,
    }
}

/// Start the REPL thread; commands arrive on the returned channel.
pub fn spawn_repl() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                warn!("REPL unavailable: {}", e);
                return;
            }
        };

        loop {
            match rl.readline("touch-gw> ") {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    match parse_command(&line) {
                        Some(cmd) => {
                            let quit = cmd == Command::Quit;
                            if tx.blocking_send(cmd).is_err() || quit {
                                break;
                            }
                        }
                        None => {
                            if !line.trim().is_empty() {
                                println!(
                                    "commands: enable | disable | toggle | lock | unlock | backpack | panic | status | quit"
                                );
                            }
                        }
                    }
                }
                Err(_) => {
                    let _ = tx.blocking_send(Command::Quit);
                    break;
                }
            }
        }
    });

    rx
}

/// Pretty-print an engine status record.
pub fn print_status(status: &EngineStatus) {
    println!("\n{}", "=== Touch GW status ===".bold().cyan());

    let mode = match status.mode.as_str() {
        "battle" => status.mode.red().bold(),
        "free" => status.mode.yellow(),
        _ => status.mode.normal(),
    };
    println!("  mode:       {}", mode);
    println!("  mapping:    {}", on_off(status.mapping_enabled));
    println!("  cam lock:   {}", on_off(status.camera_lock));
    println!("  backpack:   {}", on_off(status.backpack_open));
    println!("  target:     {}", on_off(status.target_active));
    println!(
        "  move keys:  up={} down={} left={} right={}",
        bit(status.move_keys.up),
        bit(status.move_keys.down),
        bit(status.move_keys.left),
        bit(status.move_keys.right)
    );
    println!(
        "  sessions:   camera={} joystick={} wheel={} (recenter pending: {})",
        bit(status.camera_active),
        bit(status.joystick_active),
        bit(status.wheel_active),
        bit(status.recenter_pending)
    );
    println!("  taps queued: {}", status.pending_taps);
    println!("  injector:   {}", status.injector);
    if let Some(warning) = &status.warning {
        println!("  {} {}", "warning:".red().bold(), warning);
    }
    println!();
}

fn on_off(v: bool) -> colored::ColoredString {
    if v {
        "on".green()
    } else {
        "off".normal()
    }
}

fn bit(v: bool) -> u8 {
    u8::from(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_aliases() {
        assert_eq!(parse_command("enable"), Some(Command::Enable));
        assert_eq!(parse_command(" ON "), Some(Command::Enable));
        assert_eq!(parse_command("bp"), Some(Command::Backpack));
        assert_eq!(parse_command("q"), Some(Command::Quit));
        assert_eq!(parse_command("status"), Some(Command::Status));
    }

    #[test]
    fn test_parse_command_rejects_unknown() {
        assert_eq!(parse_command("frobnicate"), None);
        assert_eq!(parse_command(""), None);
    }
}
