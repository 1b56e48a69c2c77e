use std::io::Write;

use pacul_bucket::{Bucket, BlobKey, BucketConfig};
use rustyline::{DefaultEditor, Result, error::ReadlineError};
use tracing_subscriber::EnvFilter;

const HISTORY_FILE: &str = ".pacul_bucket_history";

fn read_multiline_command(rl: &mut DefaultEditor) -> Result<String> {
    let mut input = String::new();
    let mut prompt = "bucket> ".to_string();

    loop {
        let line = rl.readline(&prompt)?;
        let trimmed_line = line.trim_end();

        // Trailing backslash continues the command on the next line
        if let Some(line_without_backslash) = trimmed_line.strip_suffix('\\') {
            input.push_str(line_without_backslash);
            input.push(' ');
            prompt = "     -> ".to_string();
        } else {
            input.push_str(trimmed_line);
            break;
        }
    }

    Ok(input)
}

fn parse_key(arg: &str) -> BlobKey {
    match arg.strip_prefix('@').map(str::parse::<u64>) {
        Some(Ok(offset)) => BlobKey::Offset(offset),
        _ => BlobKey::Name(arg.to_string()),
    }
}

fn run_command(bucket: &Bucket, cmd: &str, args: &str) -> std::result::Result<(), String> {
    let mut parts = args.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim();

    match cmd {
        "put" => {
            let offset = bucket
                .upload(first, rest.as_bytes())
                .map_err(|e| e.to_string())?;
            println!("stored '{}' at @{}", first, offset);
        }
        "putfile" => {
            let content = std::fs::read(rest).map_err(|e| e.to_string())?;
            let offset = bucket.upload(first, &content).map_err(|e| e.to_string())?;
            println!("stored '{}' ({} bytes) at @{}", first, content.len(), offset);
        }
        "get" => {
            let blob = bucket.get(parse_key(first)).map_err(|e| e.to_string())?;
            println!("{}", String::from_utf8_lossy(&blob.content));
        }
        "stat" => {
            let metadata = bucket
                .get_metadata(parse_key(first))
                .map_err(|e| e.to_string())?;
            println!("{}: {} bytes", metadata.name, metadata.size);
        }
        "rm" => {
            bucket.delete(parse_key(first)).map_err(|e| e.to_string())?;
            println!("deleted {}", first);
        }
        "ls" => {
            let blobs = bucket.list_blobs();
            if blobs.is_empty() {
                println!("(empty)");
            }
            for (name, offset) in blobs {
                println!("@{:<10} {}", offset, name);
            }
        }
        "info" => {
            let header = bucket.header();
            println!("path:             {}", bucket.path().display());
            println!("page size:        {}", header.page_size);
            println!("pages:            {}", header.page_count);
            println!("free pages:       {}", header.page_table.free_count());
            println!("directory offset: {}", header.directory_offset);
        }
        _ => return Err(format!("unknown command '{}', try 'help'", cmd)),
    }
    Ok(())
}

fn process_command(bucket: &Bucket, command: &str) -> bool {
    let command = command.trim();
    let (cmd, args) = command
        .split_once(char::is_whitespace)
        .unwrap_or((command, ""));

    match cmd.to_lowercase().as_str() {
        "exit" | "quit" | "q" => {
            println!("Goodbye!");
            return false;
        }
        "help" | "h" => {
            println!(
                r#"
Available commands:
  put <name> <text>       - Store text as a blob
  putfile <name> <path>   - Store a local file as a blob
  get <name|@offset>      - Print a blob's content
  stat <name|@offset>     - Show a blob's name and size
  rm <name|@offset>       - Delete a blob
  ls                      - List blobs with their head offsets
  info                    - Show bucket geometry and free pages
  clear                   - Clear the screen
  exit, quit, q           - Exit

Use '\' at the end of a line for multiline input.
"#
            );
        }
        "clear" => {
            print!("\x1B[2J\x1B[1;1H");
            let _ = std::io::stdout().flush();
        }
        "" => {}
        other => {
            if let Err(e) = run_command(bucket, other, args) {
                println!("Error: {}", e);
            }
        }
    }

    true
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hello.bucket".to_string());
    let bucket = match Bucket::open_or_create(&path, &BucketConfig::default()) {
        Ok(bucket) => bucket,
        Err(e) => {
            eprintln!("Failed to open bucket '{}': {}", path, e);
            std::process::exit(1);
        }
    };
    println!("PACUL BUCKET - {}", path);

    let mut rl = DefaultEditor::new()?;
    let _ = rl.load_history(HISTORY_FILE);

    loop {
        match read_multiline_command(&mut rl) {
            Ok(input) => {
                let command = input.trim().to_string();
                if !command.is_empty() {
                    rl.add_history_entry(&command)?;
                }
                if !process_command(&bucket, &command) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("EOF");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    if let Err(e) = bucket.close() {
        eprintln!("Failed to close bucket: {}", e);
    }
    Ok(())
}
