#[cfg(feature = "cli_app")]
mod cli {
    use std::fs;
    use std::io::{self, BufRead, Write};
    use std::time::Instant;

    use clap::Parser;
    use tracing::error;
    use tracing_subscriber::EnvFilter;

    use datacolumn::cli_app::{display_grid, parse_mode, process_command, Session};
    use datacolumn::{Column, ColumnMode};

    /// Interactive editor for a single data column.
    #[derive(Parser, Debug)]
    #[command(version, about)]
    pub struct Args {
        /// Column name
        #[arg(default_value = "A")]
        name: String,

        /// Column mode: numeric, text, month, day or datetime
        #[arg(long, default_value = "numeric", value_parser = parse_mode_arg)]
        mode: ColumnMode,

        /// Number of empty rows to start with
        #[arg(long, default_value_t = 0)]
        rows: usize,

        /// Load a saved column instead of creating one
        #[arg(long)]
        open: Option<String>,

        /// Tracing filter, e.g. `warn` or `datacolumn=debug`
        #[arg(long)]
        log_level: Option<String>,
    }

    fn parse_mode_arg(s: &str) -> Result<ColumnMode, String> {
        parse_mode(s).ok_or_else(|| format!("unknown column mode '{}'", s))
    }

    fn init_logging(level: Option<&str>) {
        let filter = match level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    fn open_column(args: &Args) -> Result<Column, Box<dyn std::error::Error>> {
        match &args.open {
            Some(path) => {
                let xml = fs::read_to_string(path)?;
                Ok(Column::from_xml_str(&xml)?)
            }
            None => {
                let mut column = Column::new(&args.name, args.mode);
                if args.rows > 0 {
                    column.insert_rows(0, args.rows);
                    column.clear_undo_stack();
                }
                Ok(column)
            }
        }
    }

    fn prompt(elapsed_time: f64, status_msg: &str, interactive: bool) -> io::Result<()> {
        if interactive {
            print!("[{:.1}] ({}) > ", elapsed_time, status_msg);
        } else {
            println!("[{:.1}] ({})", elapsed_time, status_msg);
        }
        io::stdout().flush()
    }

    pub fn main() -> Result<(), Box<dyn std::error::Error>> {
        let args = Args::parse();
        init_logging(args.log_level.as_deref());

        let column = open_column(&args).map_err(|err| {
            error!(%err, "cannot open column");
            err
        })?;
        let mut session = Session::new(column);
        let interactive = atty::is(atty::Stream::Stdin);

        let mut status_msg = String::from("ok");
        display_grid(&session);
        prompt(0.0, &status_msg, interactive)?;

        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            let cmd = line.trim();
            if cmd.is_empty() {
                continue;
            }
            if cmd == "q" {
                break;
            }

            let start = Instant::now();
            process_command(&mut session, cmd, &mut status_msg);
            let elapsed_time = start.elapsed().as_secs_f64();

            display_grid(&session);
            prompt(elapsed_time, &status_msg, interactive)?;
            status_msg = "ok".to_string();
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "cli_app")]
    {
        cli::main()
    }

    #[cfg(not(feature = "cli_app"))]
    {
        eprintln!("Error: built without the 'cli_app' feature.");
        std::process::exit(1);
    }
}
