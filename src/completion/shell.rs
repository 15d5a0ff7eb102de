//! The shell side of completion
//!
//! A program supports completion by checking `<PROG>_COMPLETE` on start-up.
//! `source_<shell>` prints a script the user evaluates once; that script
//! calls the program again with `complete_<shell>` and the partial command
//! line in shell-specific variables, and the program prints one candidate
//! per line (zsh: per three lines).

use crate::completion::{complete, CompletionItem};
use crate::model::{envvar_name, Command};
use crate::runner::ContextSettings;
use log::debug;
use std::env;
use std::rc::Rc;

const BASH_SOURCE: &str = r#"%FUNC%() {
    local IFS=$'\n'
    local response

    response=$(env COMP_WORDS="${COMP_WORDS[*]}" COMP_CWORD=$COMP_CWORD %VAR%=complete_bash $1)

    for completion in $response; do
        IFS=',' read type value <<< "$completion"

        if [[ $type == 'dir' ]]; then
            COMPREPLY=()
            compopt -o dirnames
        elif [[ $type == 'file' ]]; then
            COMPREPLY=()
            compopt -o default
        elif [[ $type == 'plain' ]]; then
            COMPREPLY+=($value)
        fi
    done

    return 0
}

%FUNC%_setup() {
    complete -o nosort -F %FUNC% %PROG%
}

%FUNC%_setup;
"#;

const ZSH_SOURCE: &str = r#"#compdef %PROG%

%FUNC%() {
    local -a completions
    local -a completions_with_descriptions
    local -a response
    (( ! $+commands[%PROG%] )) && return 1

    response=("${(@f)$(env COMP_WORDS="${words[*]}" COMP_CWORD=$((CURRENT-1)) %VAR%=complete_zsh %PROG%)}")

    for type key descr in ${response}; do
        if [[ "$type" == "plain" ]]; then
            if [[ "$descr" == "_" ]]; then
                completions+=("$key")
            else
                completions_with_descriptions+=("$key":"$descr")
            fi
        elif [[ "$type" == "dir" ]]; then
            _path_files -/
        elif [[ "$type" == "file" ]]; then
            _path_files -f
        fi
    done

    if [ -n "$completions_with_descriptions" ]; then
        _describe -V unsorted completions_with_descriptions -U
    fi

    if [ -n "$completions" ]; then
        compadd -U -V unsorted -a completions
    fi
}

if [[ $zsh_eval_context[-1] == loadautofunc ]]; then
    %FUNC% "$@"
else
    compdef %FUNC% %PROG%
fi
"#;

const FISH_SOURCE: &str = r#"function %FUNC%;
    set -l response (env %VAR%=complete_fish COMP_WORDS=(commandline -cp) COMP_CWORD=(commandline -t) %PROG%);

    for completion in $response;
        set -l metadata (string split "," $completion);

        if test $metadata[1] = "dir";
            __fish_complete_directories $metadata[2];
        else if test $metadata[1] = "file";
            __fish_complete_path $metadata[2];
        else if test $metadata[1] = "plain";
            echo $metadata[2];
        end;
    end;
end;

complete --no-files --command %PROG% --arguments "(%FUNC%)";
"#;

/// Shells the protocol supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    pub fn from_name(name: &str) -> Option<Shell> {
        match name {
            "bash" => Some(Shell::Bash),
            "zsh" => Some(Shell::Zsh),
            "fish" => Some(Shell::Fish),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
        }
    }

    /// The activation script for `prog_name`
    pub fn source(&self, prog_name: &str, complete_var: &str) -> String {
        let template = match self {
            Shell::Bash => BASH_SOURCE,
            Shell::Zsh => ZSH_SOURCE,
            Shell::Fish => FISH_SOURCE,
        };
        template
            .replace("%FUNC%", &complete_func_name(prog_name))
            .replace("%VAR%", complete_var)
            .replace("%PROG%", prog_name)
    }

    /// Completed words after the program name, and the fragment being
    /// typed, read through `lookup` from the shell's variables
    pub fn completion_args(&self, lookup: impl Fn(&str) -> Option<String>) -> (Vec<String>, String) {
        let words = split_arg_string(&lookup("COMP_WORDS").unwrap_or_default());
        match self {
            Shell::Bash | Shell::Zsh => {
                let cword = lookup("COMP_CWORD")
                    .and_then(|c| c.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let end = cword.min(words.len());
                let args = words.get(1..end).map(<[String]>::to_vec).unwrap_or_default();
                let incomplete = words.get(cword).cloned().unwrap_or_default();
                (args, incomplete)
            }
            Shell::Fish => {
                let incomplete = lookup("COMP_CWORD").unwrap_or_default();
                let mut args: Vec<String> = words.into_iter().skip(1).collect();
                if !incomplete.is_empty() && args.last() == Some(&incomplete) {
                    args.pop();
                }
                (args, incomplete)
            }
        }
    }

    /// One candidate in this shell's output format
    pub fn format_item(&self, item: &CompletionItem) -> String {
        match self {
            Shell::Bash => format!("{},{}", item.kind, item.value),
            Shell::Zsh => format!(
                "{}\n{}\n{}",
                item.kind,
                item.value.replace(':', "\\:"),
                item.help.as_deref().unwrap_or("_")
            ),
            Shell::Fish => match &item.help {
                Some(help) => format!("{},{}\t{}", item.kind, item.value, help),
                None => format!("{},{}", item.kind, item.value),
            },
        }
    }
}

/// `my-tool` → `MY_TOOL_COMPLETE`
pub fn complete_var_name(prog_name: &str) -> String {
    format!("{}_COMPLETE", envvar_name(prog_name))
}

fn complete_func_name(prog_name: &str) -> String {
    let safe: String = prog_name
        .chars()
        .map(|c| if c == '-' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    format!("_{}_completion", safe)
}

/// Split a shell command line into words. Quotes and backslashes are
/// honored; an unterminated quote ends the last word instead of failing,
/// since the user is usually still typing it.
pub fn split_arg_string(line: &str) -> Vec<String> {
    #[derive(PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    current.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.peek() {
                    Some(&next) if matches!(next, '"' | '\\' | '$' | '`') => {
                        current.push(next);
                        chars.next();
                    }
                    _ => current.push(c),
                },
                _ => current.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    in_word = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    if in_word {
        words.push(current);
    }
    words
}

/// Run one protocol instruction (`source_bash`, `complete_zsh`, ...) and
/// return what to print; `None` for an unknown shell or instruction
pub fn render_instruction(
    cli: &Rc<Command>,
    prog_name: &str,
    complete_var: &str,
    instruction: &str,
    extra: ContextSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let (action, shell) = instruction.split_once('_')?;
    let shell = Shell::from_name(shell)?;
    match action {
        "source" => Some(shell.source(prog_name, complete_var)),
        "complete" => {
            let (args, incomplete) = shell.completion_args(lookup);
            let items = match complete(cli, prog_name, &args, &incomplete, extra) {
                Ok(items) => items,
                Err(err) => {
                    debug!("completion failed: {}", err);
                    Vec::new()
                }
            };
            let lines: Vec<String> = items.iter().map(|i| shell.format_item(i)).collect();
            Some(lines.join("\n"))
        }
        _ => None,
    }
}

/// If the completion variable is set, answer the shell and return the exit
/// code the process should end with
pub fn handle_completion(cli: &Rc<Command>, prog_name: &str, extra: ContextSettings) -> Option<i32> {
    let complete_var = complete_var_name(prog_name);
    let instruction = env::var(&complete_var).ok().filter(|v| !v.is_empty())?;
    debug!("completion instruction '{}'", instruction);
    match render_instruction(cli, prog_name, &complete_var, &instruction, extra, |k| {
        env::var(k).ok()
    }) {
        Some(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Some(0)
        }
        None => Some(1),
    }
}
