use framelink::prelude::*;

/// Something a script asked the host loop to do. Applied after the
/// dispatcher update so scripts never touch the viewport directly.
#[derive(Clone, Debug, PartialEq)]
pub enum HostCommand {
    SetOverlay(bool),
    Resize(u32, u32),
    SetFps(f32),
    Quit,
}

/// Executes the host's tiny line-based script language. Statements are
/// separated by newlines or `;`:
///
/// ```text
/// print hello world
/// overlay off; resize 640 480
/// fps 30
/// quit
/// ```
#[derive(Debug, Default)]
pub struct ScriptHost {
    pending: Vec<HostCommand>,
}

impl ScriptHost {
    pub fn take_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.pending)
    }

    fn run_statement(&mut self, statement: &str) -> Result<(), String> {
        let (keyword, rest) = statement
            .split_once(char::is_whitespace)
            .map(|(keyword, rest)| (keyword, rest.trim()))
            .unwrap_or((statement, ""));

        match keyword {
            "print" => {
                info!("{}", rest);
            }
            "overlay" => {
                let visible = match rest {
                    "on" | "true" => true,
                    "off" | "false" => false,
                    other => {
                        return Err(format!(
                            "overlay expects on|off: {}",
                            other
                        ));
                    }
                };
                self.pending.push(HostCommand::SetOverlay(visible));
            }
            "resize" => {
                let mut parts = rest.split_whitespace().map(str::parse::<u32>);
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(Ok(width)), Some(Ok(height)), None) => {
                        self.pending.push(HostCommand::Resize(width, height));
                    }
                    _ => {
                        return Err(format!(
                            "resize expects <width> <height>: {}",
                            rest
                        ));
                    }
                }
            }
            "fps" => {
                let fps = rest
                    .parse::<f32>()
                    .map_err(|err| format!("fps '{}': {}", rest, err))?;
                self.pending.push(HostCommand::SetFps(fps));
            }
            "quit" => self.pending.push(HostCommand::Quit),
            other => return Err(format!("unknown command '{}'", other)),
        }

        Ok(())
    }
}

impl ScriptExecutor for ScriptHost {
    /// Stops at the first failing statement; statements before it keep
    /// their effect.
    fn execute(&mut self, script: &str) -> Result<(), String> {
        script
            .split(['\n', ';'])
            .map(str::trim)
            .filter(|statement| {
                !statement.is_empty() && !statement.starts_with('#')
            })
            .try_for_each(|statement| self.run_statement(statement))
    }
}
