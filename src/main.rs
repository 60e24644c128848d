//! xhr-shim - XMLHttpRequest over a streaming transport
//!
//! Runs one request through the emulated XMLHttpRequest and prints every event
//! it emits.

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use xhr_shim::{NAME, VERSION, XhrEventType, XhrResponse, XmlHttpRequest};

const USAGE: &str = "usage: xhr-shim [-X METHOD] [-H 'Name: value']... [-d BODY] \
[--type TYPE] [--timeout MS] [--stream] [--mime MIME] [--credentials] URL";

/// Parsed command line
#[derive(Debug, Default)]
struct Options {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    response_type: String,
    timeout_ms: u64,
    stream: bool,
    mime: Option<String>,
    credentials: bool,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut opts = Options {
        method: "GET".to_string(),
        ..Default::default()
    };
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let flag = arg.as_str();
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match flag {
            "-X" | "--method" => opts.method = value(flag)?,
            "-H" | "--header" => {
                let raw = value(flag)?;
                let (name, val) = raw
                    .split_once(':')
                    .ok_or_else(|| format!("malformed header {:?}", raw))?;
                opts.headers.push((name.trim().to_string(), val.trim().to_string()));
            }
            "-d" | "--data" => opts.body = Some(value(flag)?),
            "--type" => opts.response_type = value(flag)?,
            "--timeout" => {
                let raw = value(flag)?;
                opts.timeout_ms = raw.parse().map_err(|_| format!("bad timeout {:?}", raw))?;
            }
            "--mime" => opts.mime = Some(value(flag)?),
            "--stream" => opts.stream = true,
            "--credentials" => opts.credentials = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with('-') => return Err(format!("unknown flag {}\n{}", other, USAGE)),
            other => opts.url = other.to_string(),
        }
    }

    if opts.url.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok(opts)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::from(2);
        }
    };

    match run(opts).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: Options) -> xhr_shim::Result<bool> {
    log::info!("{} v{}", NAME, VERSION);

    let xhr = XmlHttpRequest::with_default_client()?;
    xhr.set_response_type(opts.response_type.parse()?);
    xhr.set_timeout(Duration::from_millis(opts.timeout_ms));
    xhr.set_with_credentials(opts.credentials);
    xhr.set_stream_request_bad_for_performance(opts.stream);
    if let Some(mime) = &opts.mime {
        xhr.override_mime_type(mime);
    }

    for event_type in XhrEventType::ALL {
        let reader = xhr.clone();
        xhr.add_event_listener(event_type, move |event| match event.event_type {
            XhrEventType::ReadyStateChange => {
                eprintln!("· {} ({:?})", event.event_type, reader.ready_state())
            }
            XhrEventType::Progress => eprintln!("· progress ({} bytes)", event.loaded),
            _ => eprintln!("· {}", event.event_type),
        });
    }

    xhr.open(&opts.method, &opts.url);
    for (name, value) in &opts.headers {
        xhr.set_request_header(name, value);
    }

    let outcome = xhr.send(opts.body.map(Into::into)).await;

    println!("{} {}", xhr.status(), xhr.status_text());
    let headers = xhr.get_all_response_headers();
    if !headers.is_empty() {
        println!("{}\n", headers);
    }
    match xhr.response() {
        XhrResponse::Null => {}
        XhrResponse::Text(text) => println!("{}", text),
        XhrResponse::Json(value) => println!("{:#}", value),
        XhrResponse::Blob(blob) => println!("{}", blob.to_data_url()),
        XhrResponse::ArrayBuffer(bytes) => println!("<{} bytes>", bytes.len()),
    }

    Ok(outcome.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_full_command_line() {
        let opts = parse_args(&args(&[
            "-X", "POST", "-H", "X-A: 1", "-d", "{}", "--type", "json", "--timeout", "500", "--stream",
            "https://example.com/",
        ]))
        .unwrap();

        assert_eq!(opts.method, "POST");
        assert_eq!(opts.headers, vec![("X-A".to_string(), "1".to_string())]);
        assert_eq!(opts.body.as_deref(), Some("{}"));
        assert_eq!(opts.response_type, "json");
        assert_eq!(opts.timeout_ms, 500);
        assert!(opts.stream);
        assert_eq!(opts.url, "https://example.com/");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["-H", "nocolon", "https://x"])).is_err());
        assert!(parse_args(&args(&["--bogus", "https://x"])).is_err());
        assert!(parse_args(&args(&["--timeout"])).is_err());
    }
}
