//! Sources of MFA codes: the interactive terminal, or a code passed up front.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::Error;

const PROMPT: &str = "MFA code: ";

/// Supplies one MFA code when the credential cache needs a refresh.
pub trait CodeSource {
    fn mfa_code(&mut self) -> Result<String, Error>;
}

/// Reads the code from standard input, prompting on standard error so that
/// standard output stays reserved for export statements.
pub struct TerminalPrompt;

impl CodeSource for TerminalPrompt {
    fn mfa_code(&mut self) -> Result<String, Error> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Err(Error::NoTerminal);
        }
        read_code(&mut stdin.lock(), &mut io::stderr())
    }
}

/// A code given on the command line.
pub struct ProvidedCode(pub String);

impl CodeSource for ProvidedCode {
    fn mfa_code(&mut self) -> Result<String, Error> {
        let code = self.0.trim();
        if is_valid_code(code) {
            Ok(code.to_string())
        } else {
            Err(Error::InvalidCode)
        }
    }
}

/// Prompts until a well-formed code is entered. Blocks without a timeout; EOF
/// cancels.
fn read_code<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<String, Error> {
    loop {
        write!(output, "{PROMPT}").map_err(Error::PromptIo)?;
        output.flush().map_err(Error::PromptIo)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(Error::PromptIo)? == 0 {
            return Err(Error::PromptCancelled);
        }

        let code = line.trim();
        if is_valid_code(code) {
            return Ok(code.to_string());
        }
        if !code.is_empty() {
            writeln!(output, "MFA code must be 6 digits").map_err(Error::PromptIo)?;
        }
    }
}

fn is_valid_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}
