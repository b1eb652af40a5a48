//! Line-based command format parser.
//!
//! ```text
//! center            # buffer a point
//! pan 25            # buffer a capability
//! center!           # buffer and write the frame
//! animate 5 pan=25 center
//! write
//! ```

use thiserror::Error;

/// Commands recognized by the command line driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a named command. A trailing `!` writes immediately.
    Call { name: String, value: Option<f64> },
    /// Fade to the result of several named commands.
    Animate {
        seconds: f64,
        targets: Vec<(String, Option<f64>)>,
    },
    /// Write the current frame.
    Write,
}

pub type ParserResult<T> = Result<T, ParserError>;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("{0} is missing an argument")]
    MissingArgument(&'static str),
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

/// Parse a single line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> ParserResult<Option<Command>> {
    let line = match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    };
    let mut tokens = line.split_whitespace();
    let head = match tokens.next() {
        Some(head) => head,
        None => return Ok(None),
    };

    let cmd = match head {
        "write" => {
            expect_end(&mut tokens)?;
            Command::Write
        }
        "animate" => {
            let seconds = tokens.next().ok_or(ParserError::MissingArgument("animate"))?;
            let seconds = parse_number(seconds)?;
            let targets = tokens.map(parse_target).collect::<ParserResult<Vec<_>>>()?;
            if targets.is_empty() {
                return Err(ParserError::MissingArgument("animate"));
            }
            Command::Animate { seconds, targets }
        }
        name => {
            let value = tokens.next().map(parse_number).transpose()?;
            expect_end(&mut tokens)?;
            Command::Call {
                name: name.to_string(),
                value,
            }
        }
    };
    Ok(Some(cmd))
}

/// `pan=25` or a bare point name.
fn parse_target(token: &str) -> ParserResult<(String, Option<f64>)> {
    match token.split_once('=') {
        Some((name, value)) => Ok((name.to_string(), Some(parse_number(value)?))),
        None => Ok((token.to_string(), None)),
    }
}

fn parse_number(token: &str) -> ParserResult<f64> {
    token
        .parse()
        .map_err(|_| ParserError::InvalidNumber(token.to_string()))
}

fn expect_end<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> ParserResult<()> {
    match tokens.next() {
        Some(extra) => Err(ParserError::UnexpectedArgument(extra.to_string())),
        None => Ok(()),
    }
}
