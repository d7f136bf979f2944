// Scripted in-process HTTP server for exercising the client against real sockets.
// Shared with the integration tests through `include!`, so it only uses std and serde_json.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const STALL_FOR: Duration = Duration::from_secs(40);

/// One canned reply, served to one accepted connection.
#[derive(Clone, Debug)]
pub enum ScriptedResponse {
    Raw(String),
    Delayed(Duration, String),
    Stall,
}

impl ScriptedResponse {
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::Raw(http_response(status, "text/plain", body))
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::Raw(http_response(status, "application/json", &body.to_string()))
    }

    pub fn delayed(delay: Duration, response: ScriptedResponse) -> Self {
        match response {
            Self::Raw(text) | Self::Delayed(_, text) => Self::Delayed(delay, text),
            Self::Stall => Self::Stall,
        }
    }

    /// Accept and read the request, then never answer.
    pub fn stall() -> Self {
        Self::Stall
    }
}

/// A request observed by the server.
#[derive(Clone, Debug, Default)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serves the scripted responses in order, one per connection.
pub struct ScriptedServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedServer {
    pub fn start(responses: Vec<ScriptedResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind scripted server");
        let addr = listener.local_addr().expect("scripted server addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for response in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let recorded = Arc::clone(&recorded);
                thread::spawn(move || serve_connection(stream, response, recorded));
            }
        });
        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|request| request.path).collect()
    }
}

/// URL of a local port with nothing listening on it.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let addr = listener.local_addr().expect("probe port addr");
    drop(listener);
    format!("http://{addr}")
}

fn serve_connection(
    mut stream: TcpStream,
    response: ScriptedResponse,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let request = read_request(&mut stream);
    if let Ok(mut guard) = recorded.lock() {
        guard.push(request);
    }
    match response {
        ScriptedResponse::Raw(text) => {
            let _ = stream.write_all(text.as_bytes());
        }
        ScriptedResponse::Delayed(delay, text) => {
            thread::sleep(delay);
            let _ = stream.write_all(text.as_bytes());
        }
        ScriptedResponse::Stall => thread::sleep(STALL_FOR),
    }
    let _ = stream.flush();
}

fn read_request(stream: &mut TcpStream) -> RecordedRequest {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return RecordedRequest::default(),
            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
        }
    };
    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(read) => body.extend_from_slice(&chunk[..read]),
        }
    }
    RecordedRequest {
        method,
        path,
        headers,
        body,
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

fn http_response(status: u16, content_type: &str, body: &str) -> String {
    let reason = if (200..300).contains(&status) { "OK" } else { "Error" };
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}
