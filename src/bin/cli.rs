use mdbms::wire::{Request, Response};
use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;
use std::process::ExitCode;

struct Args {
    host: String,
    port: u16,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut host = "127.0.0.1".to_string();
    let mut port = mdbms::config::PORT;
    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "--host" | "-h" => {
                i += 1;
                host = raw.get(i).ok_or("missing value for --host")?.clone();
            }
            "--port" | "-p" => {
                i += 1;
                let value = raw.get(i).ok_or("missing value for --port")?;
                port = value.parse().map_err(|_| format!("invalid port '{value}'"))?;
            }
            other => return Err(format!("unrecognized argument '{other}'")),
        }
        i += 1;
    }
    Ok(Args { host, port })
}

/// Opens one connection, sends `request`, half-closes the write side, and
/// reads the response to EOF, matching the wire protocol's one-shot
/// request/response contract.
fn send_request(host: &str, port: u16, request: &Request) -> io::Result<Response> {
    let mut stream = TcpStream::connect((host, port))?;
    let payload = serde_json::to_vec(request).expect("Request always serializes");
    stream.write_all(&payload)?;
    stream.shutdown(std::net::Shutdown::Write)?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw)?;
    serde_json::from_slice(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("mdbms-cli: {message}");
            return ExitCode::from(255);
        }
    };

    println!("mdbms-cli connected to {}:{} (type EXIT to quit)", args.host, args.port);
    let mut transaction_id: i64 = -1;
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break;
        }

        let request = Request { transaction_id, query: query.to_string() };
        match send_request(&args.host, args.port, &request) {
            Ok(response) => {
                transaction_id = response.transaction_id;
                print_response(&response);
            }
            Err(e) => eprintln!("connection error: {e}"),
        }
    }
    ExitCode::SUCCESS
}

fn print_response(response: &Response) {
    if response.success {
        println!("OK [{}] {}", response.transaction_id, response.message);
    } else {
        println!("ERROR [{}] {}", response.transaction_id, response.message);
    }
    if let Some(rows) = &response.data {
        for row in rows {
            let mut cols: Vec<String> = row.columns.iter().map(|(k, v)| format!("{k}={}", v.value)).collect();
            cols.sort();
            println!("  {} {{{}}}", row.id, cols.join(", "));
        }
    }
}
