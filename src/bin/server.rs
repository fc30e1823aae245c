use mdbms::concurrency::ProtocolKind;
use std::process::ExitCode;

struct Args {
    host: String,
    port: u16,
    protocol: ProtocolKind,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut host = "127.0.0.1".to_string();
    let mut port = mdbms::config::PORT;
    let mut protocol = ProtocolKind::TwoPhaseLocking;

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
            "--protocol" => {
                i += 1;
                let value = raw.get(i).ok_or("missing value for --protocol")?;
                protocol = match value.to_lowercase().as_str() {
                    "2pl" | "locking" | "two-phase-locking" => ProtocolKind::TwoPhaseLocking,
                    "to" | "timestamp" | "timestamp-ordering" => ProtocolKind::TimestampOrdering,
                    "occ" | "optimistic" | "optimistic-validation" => ProtocolKind::OptimisticValidation,
                    other => return Err(format!("unknown protocol '{other}'")),
                };
            }
            other => return Err(format!("unrecognized argument '{other}'")),
        }
        i += 1;
    }

    Ok(Args { host, port, protocol })
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("mdbms-server: {message}");
            return ExitCode::from(255); // spec-mandated -1, as an 8-bit process exit code
        }
    };

    mdbms::run(&args.host, args.port, args.protocol);
    ExitCode::SUCCESS
}
