use std::io::{self, BufRead, Write};

/// Blocking operator prompt for the identity name.
pub trait NamePrompt {
    fn ask_name(&mut self) -> io::Result<String>;
}

/// Reads one line from an input stream, surrounding whitespace trimmed.
pub struct ConsolePrompt<R> {
    input: R,
}

impl ConsolePrompt<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> ConsolePrompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> NamePrompt for ConsolePrompt<R> {
    fn ask_name(&mut self) -> io::Result<String> {
        print!("Enter your name: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no name entered"));
        }
        Ok(line.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_trimmed() {
        let mut prompt = ConsolePrompt::new(io::Cursor::new("  carol \n"));
        assert_eq!(prompt.ask_name().unwrap(), "carol");
    }

    #[test]
    fn test_eof_is_error() {
        let mut prompt = ConsolePrompt::new(io::Cursor::new(""));
        let err = prompt.ask_name().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
