use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use clap::{Parser as ClapParser, Subcommand};
use csv::{ByteRecord, Writer, WriterBuilder};
use ryu::Buffer as RyuBuffer;
use time::OffsetDateTime;

use sas7bdat_stream::logger::{log_error, set_log_file, set_log_prefix};
use sas7bdat_stream::{
    DecodeSink, Error, FileInfo, PageSource, Parser, ParserConfig, ReaderSource, RowRef, Value,
    Window,
};

#[derive(ClapParser)]
#[command(
    name = "sas7bd",
    version,
    about = "Inspect SAS7BDAT files and stream their rows"
)]
struct Cli {
    /// Mirror decoder warnings into this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the file metadata as JSON.
    Inspect { input: PathBuf },
    /// Stream rows to stdout as CSV.
    Rows(RowsArgs),
}

#[derive(clap::Args)]
struct RowsArgs {
    input: PathBuf,

    /// Pages decoded per parse call (0 decodes everything in one call).
    #[arg(long, default_value_t = 16)]
    max_pages: usize,

    /// Stop after N rows.
    #[arg(long)]
    limit: Option<u64>,

    /// Field delimiter.
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

type AnyError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();
    if let Some(path) = &cli.log_file {
        set_log_file(path)?;
    }

    let result = match cli.command {
        Command::Inspect { input } => run_inspect(&input),
        Command::Rows(args) => run_rows(&args),
    };
    if let Err(err) = &result {
        log_error(&err.to_string());
    }
    result
}

fn open(input: &Path, max_pages: usize) -> Result<(ReaderSource<File>, ParserConfig), AnyError> {
    let source = ReaderSource::new(File::open(input)?)?;
    let mut config = ParserConfig::new().with_max_pages(max_pages);
    if let Some(len) = source.len_hint() {
        config = config.with_filesize_override(len);
    }
    Ok((source, config))
}

/// Reads metadata only and stops before the first row.
struct InspectSink {
    source: ReaderSource<File>,
}

impl DecodeSink for InspectSink {
    fn refill(&mut self, offset: usize, len: usize) -> sas7bdat_stream::Result<Window> {
        self.source.fetch(offset, len)
    }

    fn on_row(&mut self, _row: RowRef<'_>) -> sas7bdat_stream::Result<ControlFlow<()>> {
        Ok(ControlFlow::Break(()))
    }
}

fn run_inspect(input: &Path) -> Result<(), AnyError> {
    let _prefix = set_log_prefix(input.display().to_string());
    let (source, config) = open(input, 1)?;
    let parser = Parser::init(InspectSink { source }, config)?;
    serde_json::to_writer_pretty(std::io::stdout(), parser.file_info())?;
    println!();
    Ok(())
}

struct CsvRows<W: Write> {
    source: ReaderSource<File>,
    writer: Writer<W>,
    record: ByteRecord,
    field: Vec<u8>,
    ryu: RyuBuffer,
    limit: Option<u64>,
    written: u64,
}

impl<W: Write> CsvRows<W> {
    fn csv_error(err: &csv::Error) -> Error {
        Error::Io(std::io::Error::other(format!("csv write failed: {err}")))
    }

    fn encode_value(&mut self, value: &Value<'_>) {
        self.field.clear();
        match value {
            Value::Missing(_) => {}
            Value::Str(text) => self.field.extend_from_slice(text.as_bytes()),
            Value::Bytes(bytes) => self.field.extend_from_slice(bytes),
            Value::Float(v) => self.field.extend_from_slice(self.ryu.format(*v).as_bytes()),
            Value::Bool(v) => self.field.extend_from_slice(if *v { b"1" } else { b"0" }),
            Value::Int(v) => self.field.extend_from_slice(v.to_string().as_bytes()),
            Value::UInt(v) => self.field.extend_from_slice(v.to_string().as_bytes()),
            Value::Date(dt) => self.field.extend_from_slice(dt.date().to_string().as_bytes()),
            Value::DateTime(dt) => write_datetime(dt, &mut self.field),
        }
    }
}

fn write_datetime(dt: &OffsetDateTime, out: &mut Vec<u8>) {
    let time = dt.time();
    out.extend_from_slice(dt.date().to_string().as_bytes());
    out.extend_from_slice(
        format!(
            " {:02}:{:02}:{:02}",
            time.hour(),
            time.minute(),
            time.second()
        )
        .as_bytes(),
    );
    let millis = time.millisecond();
    if millis != 0 {
        out.extend_from_slice(format!(".{millis:03}").as_bytes());
    }
}

impl<W: Write> DecodeSink for CsvRows<W> {
    fn refill(&mut self, offset: usize, len: usize) -> sas7bdat_stream::Result<Window> {
        self.source.fetch(offset, len)
    }

    fn on_metadata(&mut self, info: &FileInfo) -> sas7bdat_stream::Result<()> {
        let mut header = ByteRecord::with_capacity(0, info.column_count());
        for column in &info.columns {
            header.push_field(column.name.trim_end().as_bytes());
        }
        self.writer
            .write_byte_record(&header)
            .map_err(|err| Self::csv_error(&err))
    }

    fn on_row(&mut self, row: RowRef<'_>) -> sas7bdat_stream::Result<ControlFlow<()>> {
        if self.limit.is_some_and(|limit| self.written >= limit) {
            return Ok(ControlFlow::Break(()));
        }
        self.record.clear();
        for value in row.values() {
            self.encode_value(&value?);
            self.record.push_field(&self.field);
        }
        self.writer
            .write_byte_record(&self.record)
            .map_err(|err| Self::csv_error(&err))?;
        self.written += 1;
        Ok(ControlFlow::Continue(()))
    }
}

fn run_rows(args: &RowsArgs) -> Result<(), AnyError> {
    let _prefix = set_log_prefix(args.input.display().to_string());
    let delimiter = u8::try_from(args.delimiter)
        .map_err(|_| format!("delimiter {:?} is not a single byte", args.delimiter))?;
    let (source, config) = open(&args.input, args.max_pages)?;
    let writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(BufWriter::new(std::io::stdout().lock()));
    let sink = CsvRows {
        source,
        writer,
        record: ByteRecord::new(),
        field: Vec::with_capacity(64),
        ryu: RyuBuffer::new(),
        limit: args.limit,
        written: 0,
    };

    let mut parser = Parser::init(sink, config)?;
    while parser.parse()? {
        let sink = parser.sink();
        if sink.limit.is_some_and(|limit| sink.written >= limit) {
            break;
        }
    }
    parser.into_sink().writer.flush()?;
    Ok(())
}
