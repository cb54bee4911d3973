//! Line client for the manager

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "imdg")]
#[command(about = "imdg client: send commands to the manager")]
#[command(version)]
struct Cli {
    /// Manager client address
    #[arg(long, default_value = "127.0.0.1:7000")]
    addr: String,

    /// Command to send, e.g. `set a 1`. Starts a prompt when omitted.
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let stream = TcpStream::connect(&cli.addr)
        .await
        .with_context(|| format!("cannot reach manager at {}", cli.addr))?;
    let (mut reader, mut writer) = stream.into_split();

    if !cli.command.is_empty() {
        let request = cli.command.join(" ");
        let response = send(&mut writer, &mut reader, &request).await?;
        println!("{}", response);
        return Ok(());
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("imdg> ");
        std::io::stdout().flush()?;

        let Some(line) = input.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let response = send(&mut writer, &mut reader, line).await?;
        println!("{}", response);
    }

    Ok(())
}

/// One request line out, one response back. Responses for keyless
/// commands span several lines, so take whatever one reply write delivered
/// up to its final newline.
async fn send<W, R>(writer: &mut W, reader: &mut R, request: &str) -> anyhow::Result<String>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    writer.write_all(request.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    let mut response = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            anyhow::bail!("manager closed the connection");
        }
        response.extend_from_slice(&buf[..n]);
        if response.ends_with(b"\n") {
            break;
        }
    }

    response.pop();
    Ok(String::from_utf8_lossy(&response).into_owned())
}
