//! Console command grammar.

use promptlab_core::{ParameterKey, PickerKey};

pub const HELP: &str = "\
commands:
  params                      show current parameters
  set <key> <value>           temperature | maxTokens | topP
  copy-params                 copy parameters as JSON
  download-params             write params.json to the export dir
  models                      list models (* = selected)
  model <id>                  select a model
  key <enter|space|up|down|escape>   drive the model picker
  click <outside|trigger|N>   pointer input for the model picker
  theme                       toggle dark/light
  templates                   list saved templates
  save <title> | <content>    save a template
  load <id>                   load a template into the chat input
  input                       show the chat input buffer
  send [text]                 send text (or the input buffer)
  history                     show the chat log
  copy <message-id>           copy a message
  download <message-id>       write output-<id>.json
  status                      typing indicator, theme, last errors
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Params,
    Set { key: ParameterKey, value: f64 },
    CopyParams,
    DownloadParams,
    Models,
    Model(String),
    Key(PickerKey),
    ClickOutside,
    ClickTrigger,
    ClickOption(usize),
    Theme,
    Templates,
    Save { title: String, content: String },
    Load(String),
    Input,
    /// `None` sends the input buffer.
    Send(Option<String>),
    History,
    Copy(String),
    Download(String),
    Status,
    Quit,
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (line, ""),
    };

    let cmd = match head.to_ascii_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "params" => Command::Params,
        "set" => {
            let (key, value) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: set <key> <value>".to_string())?;
            let key = key.parse::<ParameterKey>().map_err(|e| e.to_string())?;
            let value = value
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", value.trim()))?;
            Command::Set { key, value }
        }
        "copy-params" => Command::CopyParams,
        "download-params" => Command::DownloadParams,
        "models" => Command::Models,
        "model" => Command::Model(required(rest, "usage: model <id>")?),
        "key" => {
            let key = rest.parse::<PickerKey>().unwrap_or(PickerKey::Other);
            if key == PickerKey::Other {
                return Err(format!("unknown key '{}'", rest));
            }
            Command::Key(key)
        }
        "click" => match rest {
            "outside" => Command::ClickOutside,
            "trigger" => Command::ClickTrigger,
            n => Command::ClickOption(
                n.parse::<usize>()
                    .map_err(|_| "usage: click <outside|trigger|N>".to_string())?,
            ),
        },
        "theme" => Command::Theme,
        "templates" => Command::Templates,
        "save" => {
            // Blank parts are passed through so the store reports the validation error.
            let (title, content) = rest.split_once('|').unwrap_or((rest, ""));
            Command::Save {
                title: title.trim().to_string(),
                content: content.trim().to_string(),
            }
        }
        "load" => Command::Load(required(rest, "usage: load <id>")?),
        "input" => Command::Input,
        "send" => Command::Send((!rest.is_empty()).then(|| rest.to_string())),
        "history" => Command::History,
        "copy" => Command::Copy(required(rest, "usage: copy <message-id>")?),
        "download" => Command::Download(required(rest, "usage: download <message-id>")?),
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{}' (try help)", other)),
    };
    Ok(Some(cmd))
}

fn required(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(usage.to_string())
    } else {
        Ok(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_parameter_updates() {
        assert_eq!(
            parse("set temperature 0.5").unwrap(),
            Some(Command::Set {
                key: ParameterKey::Temperature,
                value: 0.5
            })
        );
        assert_eq!(
            parse("set max_tokens 1000").unwrap(),
            Some(Command::Set {
                key: ParameterKey::MaxTokens,
                value: 1000.0
            })
        );
        assert!(parse("set topP lots").is_err());
        assert!(parse("set seed 1").is_err());
    }

    #[test]
    fn save_splits_on_pipe() {
        assert_eq!(
            parse("save Summary | Summarize: a | b").unwrap(),
            Some(Command::Save {
                title: "Summary".into(),
                content: "Summarize: a | b".into()
            })
        );
        assert_eq!(
            parse("save | X").unwrap(),
            Some(Command::Save {
                title: "".into(),
                content: "X".into()
            })
        );
    }

    #[test]
    fn send_without_text_uses_input_buffer() {
        assert_eq!(parse("send").unwrap(), Some(Command::Send(None)));
        assert_eq!(
            parse("send Hi there").unwrap(),
            Some(Command::Send(Some("Hi there".into())))
        );
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!(parse("   ").unwrap(), None);
        assert!(parse("frobnicate").is_err());
        assert!(parse("key tab").is_err());
        assert_eq!(parse("key esc").unwrap(), Some(Command::Key(PickerKey::Escape)));
        assert_eq!(parse("click 3").unwrap(), Some(Command::ClickOption(3)));
    }
}
