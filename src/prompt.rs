use std::io::{self, Write};

use crossterm::event::{read, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

// Masked line input: characters echo as '*', Enter submits, Esc or Ctrl-C
// cancels. Returns None when cancelled.
pub fn prompt_for_token(prompt: &str) -> io::Result<Option<String>> {
    let mut out = io::stdout();
    write!(out, "{}", prompt)?;
    out.flush()?;

    enable_raw_mode()?;
    let input = read_masked(&mut out);
    disable_raw_mode()?;
    println!();
    input
}

fn read_masked(out: &mut impl Write) -> io::Result<Option<String>> {
    let mut input = String::new();
    loop {
        let key = match read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => key,
            _ => continue,
        };
        match key.code {
            KeyCode::Enter => return Ok(Some(input.trim().to_owned())),
            KeyCode::Esc => return Ok(None),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(None)
            }
            KeyCode::Backspace => {
                if input.pop().is_some() {
                    write!(out, "\u{8} \u{8}")?;
                    out.flush()?;
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                input.push(c);
                write!(out, "*")?;
                out.flush()?;
            }
            _ => {}
        }
    }
}
