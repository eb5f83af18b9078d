use std::path::PathBuf;

/// The `key:value` arguments Taskwarrior passes to every hook, e.g.
/// `api:2 args:task 3 done command:done rc:/home/u/.taskrc data:/home/u/.task version:2.6.2`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HookArgs {
    pub api: Option<String>,
    pub args: Option<String>,
    pub command: Option<String>,
    pub rc: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub version: Option<String>,
}

impl HookArgs {
    /// Unknown keys and tokens without a `:` are ignored. Values are trimmed.
    pub fn parse<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hook = HookArgs::default();
        for token in tokens {
            let Some((key, value)) = token.as_ref().split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "api" => hook.api = Some(value),
                "args" => hook.args = Some(value),
                "command" => hook.command = Some(value),
                "rc" => hook.rc = Some(PathBuf::from(value)),
                "data" => hook.data = Some(PathBuf::from(value)),
                "version" => hook.version = Some(value),
                _ => {}
            }
        }
        hook
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }
}
