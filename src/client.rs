//! Client for the student protocol.
//!
//! Every request opens a new connection, writes one line, reads one line
//! and closes. The interactive mode wraps this in a small command loop.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::{is_valid_argument, Command, Response, DELIMITER, TERMINATOR};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// One-shot request client
#[derive(Debug, Clone)]
pub struct Client {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Client {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Client {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.host.clone(), config.port, config.timeout)
    }

    /// Send a raw request line and return the raw response line.
    ///
    /// A request that never gets an answer comes back as
    /// `ERROR|Connection failed: ...`, so callers can treat it like any
    /// other error response.
    pub async fn send_request(&self, line: &str) -> String {
        match self.try_send(line).await {
            Ok(response) => response.to_string(),
            Err(e) => Response::error(format!("Connection failed: {e}")).to_string(),
        }
    }

    /// Send a request line, keeping transport failures separate from server errors.
    pub async fn try_send(&self, line: &str) -> Result<Response, ClientError> {
        let addr = (self.host.as_str(), self.port);
        let mut stream = self.limit(TcpStream::connect(addr)).await?;
        debug!(host = %self.host, port = self.port, "Connected");

        let mut request = line.trim_end_matches(['\r', '\n']).to_string();
        request.push_str(TERMINATOR);
        trace!(request = request.trim_end(), "Sending request");
        self.limit(stream.write_all(request.as_bytes())).await?;

        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        let n = self.limit(reader.read_line(&mut response)).await?;
        if n == 0 {
            return Err(ClientError::Closed);
        }

        Response::parse(&response)
            .ok_or_else(|| ClientError::MalformedResponse(response.trim_end().to_string()))
    }

    /// Send a typed command.
    ///
    /// An argument that would split into extra fields on the wire is
    /// rejected without contacting the server.
    pub async fn request(&self, command: &Command) -> Result<Response, ClientError> {
        if let Some(arg) = command.argument().filter(|arg| !is_valid_argument(arg)) {
            return Err(ClientError::InvalidArgument(arg.to_string()));
        }
        self.try_send(&command.to_string()).await
    }

    pub async fn get_all_students(&self) -> Result<Response, ClientError> {
        self.request(&Command::GetAllStudents).await
    }

    pub async fn get_student_by_id(&self, student_id: &str) -> Result<Response, ClientError> {
        self.request(&Command::GetStudentById {
            student_id: student_id.to_string(),
        })
        .await
    }

    pub async fn get_students_by_course(&self, course: &str) -> Result<Response, ClientError> {
        self.request(&Command::GetStudentsByCourse {
            course: course.to_string(),
        })
        .await
    }

    pub async fn get_students_by_year(&self, year: i64) -> Result<Response, ClientError> {
        self.request(&Command::GetStudentsByYear { year }).await
    }

    pub async fn get_honors_students(&self) -> Result<Response, ClientError> {
        self.request(&Command::GetHonorsStudents).await
    }

    pub async fn get_statistics(&self) -> Result<Response, ClientError> {
        self.request(&Command::GetStatistics).await
    }

    pub async fn search_students(&self, term: &str) -> Result<Response, ClientError> {
        self.request(&Command::SearchStudents {
            term: term.to_string(),
        })
        .await
    }

    async fn limit<F, T>(&self, io: F) -> Result<T, ClientError>
    where
        F: Future<Output = io::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, io).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ClientError::Timeout(self.timeout)),
        }
    }
}

/// A line typed at the interactive prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    Quit,
    Help,
    Request(Command),
}

/// Parse interactive input. The error is the message to show the user.
pub fn parse_input(input: &str) -> Result<Input, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Input::Empty);
    }

    let (word, rest) = match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    };
    let word = word.to_lowercase();

    let argument = |usage: &str| {
        if rest.is_empty() {
            Err(format!("Usage: {usage}"))
        } else if !is_valid_argument(rest) {
            Err(format!("Arguments cannot contain '{DELIMITER}'"))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match word.as_str() {
        "quit" | "exit" => return Ok(Input::Quit),
        "help" => return Ok(Input::Help),
        "all" => Command::GetAllStudents,
        "id" => Command::GetStudentById {
            student_id: argument("id <studentId>")?,
        },
        "course" => Command::GetStudentsByCourse {
            course: argument("course <courseName>")?,
        },
        "year" => {
            let year = argument("year <year>")?
                .parse::<i64>()
                .map_err(|_| "Invalid year format".to_string())?;
            Command::GetStudentsByYear { year }
        }
        "honors" => Command::GetHonorsStudents,
        "stats" => Command::GetStatistics,
        "search" => Command::SearchStudents {
            term: argument("search <term>")?,
        },
        other => return Err(format!("Unknown command: {other}")),
    };
    Ok(Input::Request(command))
}

const HELP: &str = "\
Commands:
  all - Get all students
  id <studentId> - Get student by ID
  course <courseName> - Get students by course
  year <year> - Get students by year
  honors - Get honors students
  stats - Get statistics
  search <term> - Search students by name
  quit - Exit";

/// Render the outcome of a request for the terminal
pub fn render(outcome: &Result<Response, ClientError>) -> String {
    match outcome {
        Ok(Response::Success(payload)) => format!("Response: {payload}"),
        Ok(Response::Error(message)) => format!("Error: {message}"),
        Err(e @ ClientError::InvalidArgument(_)) => format!("Error: {e}"),
        Err(e) => format!("Connection failed: {e}"),
    }
}

/// Run the interactive loop over `input` until `quit` or end of input.
pub async fn run_interactive<R>(client: &Client, input: R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    println!("Student Client - Interactive Mode");
    println!("{HELP}");
    println!();

    let mut lines = input.lines();
    loop {
        print!("> ");
        io::Write::flush(&mut io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Ok(Input::Empty) => continue,
            Ok(Input::Quit) => break,
            Ok(Input::Help) => println!("{HELP}"),
            Ok(Input::Request(command)) => {
                let outcome = client.request(&command).await;
                println!("{}", render(&outcome));
                println!();
            }
            Err(message) => println!("{message}"),
        }
    }

    println!("Client disconnected");
    Ok(())
}
