//! Argument-vector construction for commands run inside containers

use crate::error::{Result, SandboxError};

/// Interpreters whose inline-code payload is kept as a single argument
const INLINE_CODE_INTERPRETERS: &[(&str, &str)] = &[
    ("python", "-c"),
    ("python3", "-c"),
    ("node", "-e"),
    ("sh", "-c"),
    ("bash", "-c"),
];

/// `exec <container> <argv...>`
pub fn exec_args(container: &str, argv: Vec<String>) -> Vec<String> {
    let mut args = Vec::with_capacity(argv.len() + 2);
    args.push("exec".to_string());
    args.push(container.to_string());
    args.extend(argv);
    args
}

/// Turn a free-form command string into an argument vector.
///
/// `python -c <code>` style invocations keep everything after the flag as
/// one argument so code containing spaces or quotes survives. Everything
/// else is split with POSIX shell word rules.
pub fn parse_command(command: &str) -> Result<Vec<String>> {
    if let Some(argv) = split_inline_code(command) {
        return Ok(argv);
    }

    let argv = split_args(command)?;
    if argv.is_empty() {
        return Err(SandboxError::InvalidCommand("command is empty".to_string()));
    }
    Ok(argv)
}

/// Shell-split optional arguments; an empty string yields no arguments
pub fn split_args(args: &str) -> Result<Vec<String>> {
    shell_words::split(args).map_err(|e| SandboxError::InvalidCommand(e.to_string()))
}

fn split_inline_code(command: &str) -> Option<Vec<String>> {
    let (interpreter, rest) = command.trim_start().split_once(char::is_whitespace)?;
    let flag = INLINE_CODE_INTERPRETERS
        .iter()
        .find(|(name, _)| *name == interpreter)
        .map(|(_, flag)| *flag)?;

    let rest = rest.trim_start();
    let payload = if rest == flag {
        ""
    } else {
        rest.strip_prefix(flag)?.strip_prefix(char::is_whitespace)?
    };

    Some(vec![
        interpreter.to_string(),
        flag.to_string(),
        unquote_payload(payload.trim()),
    ])
}

/// Strip one pair of enclosing quotes when they wrap the whole payload
fn unquote_payload(payload: &str) -> String {
    let quoted = payload.len() >= 2
        && ((payload.starts_with('"') && payload.ends_with('"'))
            || (payload.starts_with('\'') && payload.ends_with('\'')));

    if quoted {
        if let Ok(mut words) = shell_words::split(payload) {
            if words.len() == 1 {
                return words.remove(0);
            }
        }
    }
    payload.to_string()
}

/// Shell snippet writing `body` to `path` and marking it executable.
///
/// The body is embedded in a single-quoted literal with `'` escaped as
/// `'\''`; nothing else is sanitized.
pub fn script_write_command(body: &str, path: &str) -> String {
    let escaped = body.replace('\'', "'\\''");
    let path = shell_words::quote(path);
    format!(
        "printf '%s\\n' '{}' > {} && chmod +x {}",
        escaped, path, path
    )
}
