use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use tracing::error;

use super::catalog::{Course, EnrollmentState};
use crate::config::Platform;

/// Answers collected when the program is started without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoginAnswers {
    pub(crate) platform: Platform,
    pub(crate) username: String,
    pub(crate) password: String,
}

/// Prints `question` and returns the answer without its line ending.
fn read_answer(input: &mut dyn BufRead, out: &mut dyn Write, question: &str) -> Result<String> {
    write!(out, "{question}").context("failed to write prompt")?;
    out.flush().context("failed to flush prompt")?;
    let mut line = String::new();
    let read = input.read_line(&mut line).context("failed to read answer")?;
    if read == 0 {
        bail!("no answer given to '{}'", question.trim());
    }
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

pub(crate) fn ask(input: &mut dyn BufRead, out: &mut dyn Write, question: &str) -> Result<String> {
    Ok(read_answer(input, out, question)?.trim().to_string())
}

/// Repeats the question until `parse` accepts the answer.
fn ask_until<T>(
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    question: &str,
    complaint: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T> {
    loop {
        let answer = ask(input, out, question)?;
        match parse(&answer) {
            Some(value) => return Ok(value),
            None => error!("{complaint}"),
        }
    }
}

fn ask_number_until(
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    question: &str,
    complaint: &str,
    valid: impl Fn(usize) -> bool,
) -> Result<usize> {
    ask_until(input, out, question, complaint, |answer| {
        answer.parse::<usize>().ok().filter(|number| valid(*number))
    })
}

/// Like [`ask`], but the terminal does not echo what is typed.
pub(crate) fn ask_secret(
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    question: &str,
) -> Result<String> {
    let answer = {
        let _echo = EchoOff::begin();
        read_answer(input, out, question)
    };
    writeln!(out).context("failed to write prompt")?;
    answer
}

/// An empty answer picks edX.
pub(crate) fn ask_platform(input: &mut dyn BufRead, out: &mut dyn Write) -> Result<Platform> {
    ask_until(
        input,
        out,
        "Platform [edx/stanford]: ",
        "Enter a known platform: edx or stanford",
        |answer| {
            if answer.is_empty() {
                Some(Platform::Edx)
            } else {
                <Platform as ValueEnum>::from_str(answer, true).ok()
            }
        },
    )
}

pub(crate) fn ask_login(input: &mut dyn BufRead, out: &mut dyn Write) -> Result<LoginAnswers> {
    let platform = ask_platform(input, out)?;
    let username = ask(input, out, "Username: ")?;
    let password = ask_secret(input, out, "Password: ")?;
    Ok(LoginAnswers {
        platform,
        username,
        password,
    })
}

pub(crate) fn choose_course(
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    courses: &[Course],
) -> Result<usize> {
    if !courses
        .iter()
        .any(|course| course.state == EnrollmentState::Started)
    {
        bail!("none of your courses has started yet");
    }
    let complaint = format!(
        "Enter a valid Number for a Started Course ! between 1 and {}",
        courses.len()
    );
    ask_number_until(input, out, "Enter Course Number: ", &complaint, |number| {
        number >= 1
            && courses
                .get(number - 1)
                .is_some_and(|course| course.state == EnrollmentState::Started)
    })
}

/// `total + 1` stands for every week.
pub(crate) fn choose_weeks(
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    total: usize,
) -> Result<Vec<usize>> {
    let complaint = format!("Enter a valid Number between 1 and {}", total + 1);
    let number = ask_number_until(input, out, "Enter Your Choice: ", &complaint, |number| {
        (1..=total + 1).contains(&number)
    })?;
    if number == total + 1 {
        Ok((1..=total).collect())
    } else {
        Ok(vec![number])
    }
}

pub(crate) fn ask_yes_no(
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    question: &str,
) -> Result<bool> {
    Ok(ask(input, out, question)?.eq_ignore_ascii_case("y"))
}

/// Clears `ECHO` on a terminal stdin and restores the old mode on drop.
#[cfg(unix)]
struct EchoOff {
    saved: Option<libc::termios>,
}

#[cfg(unix)]
impl EchoOff {
    fn begin() -> Self {
        unsafe {
            if libc::isatty(libc::STDIN_FILENO) != 1 {
                return Self { saved: None };
            }
            let mut term: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &mut term) != 0 {
                return Self { saved: None };
            }
            let saved = term;
            term.c_lflag &= !libc::ECHO;
            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &term) != 0 {
                return Self { saved: None };
            }
            Self { saved: Some(saved) }
        }
    }
}

#[cfg(unix)]
impl Drop for EchoOff {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.as_ref() {
            unsafe {
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, saved);
            }
        }
    }
}

#[cfg(not(unix))]
struct EchoOff;

#[cfg(not(unix))]
impl EchoOff {
    fn begin() -> Self {
        EchoOff
    }
}
