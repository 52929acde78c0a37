use std::env;
use std::path::PathBuf;
use std::process;

use futures::executor::block_on;
use log::warn;
use serde_json::json;
use stampcode::{
    BatchError, BatchReport, CodeForm, CodeGen, CodeRequest, DATE_FORMATS, FormError,
    MemoryStore, RecordStore, SUFFIX_FORMATS, SystemClock, grid_views, submit, text_fields,
};

const BASE_ENV: &str = "STAMPCODE_BASE";

#[derive(Debug, Clone, Default)]
struct Opts {
    base: Option<PathBuf>,
    table: Option<String>,
    view: Option<String>,
    field: Option<String>,
    prefix: Option<String>,
    format: Option<usize>,
    suffix: Option<usize>,
    count: Option<usize>,
    json: bool,
    dry_run: bool,
}

fn print_help() {
    eprintln!(
        "stampcode - timestamp-based record code generator\n\n\
Usage:\n  stampcode formats [--json]\n  stampcode next [--prefix <p>] [--format <n>] [--suffix <n>] [--count <n>] [--json]\n  stampcode tables [<base.json>] [--json]\n  stampcode views [<base.json>] --table <id> [--json]\n  stampcode fields [<base.json>] --table <id> [--json]\n  stampcode apply [<base.json>] --table <id> --view <id> --field <id> [--prefix <p>] --format <n> --suffix <n> [--dry-run] [--json]\n\n\
The base file defaults to ${BASE_ENV}. Log verbosity follows RUST_LOG.\n"
    );
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn index(args: &[String], i: usize, flag: &str) -> Result<usize, String> {
    value(args, i, flag)?
        .parse::<usize>()
        .map_err(|_| format!("invalid integer for {flag}"))
}

fn parse_flags(args: &[String]) -> Result<Opts, String> {
    let mut opts = Opts::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--table" => {
                opts.table = Some(value(args, i, "--table")?.to_string());
                i += 2;
            }
            "--view" => {
                opts.view = Some(value(args, i, "--view")?.to_string());
                i += 2;
            }
            "--field" => {
                opts.field = Some(value(args, i, "--field")?.to_string());
                i += 2;
            }
            "--prefix" => {
                opts.prefix = Some(value(args, i, "--prefix")?.to_string());
                i += 2;
            }
            "--format" => {
                opts.format = Some(index(args, i, "--format")?);
                i += 2;
            }
            "--suffix" => {
                opts.suffix = Some(index(args, i, "--suffix")?);
                i += 2;
            }
            "--count" => {
                opts.count = Some(index(args, i, "--count")?);
                i += 2;
            }
            "--json" => {
                opts.json = true;
                i += 1;
            }
            "--dry-run" => {
                opts.dry_run = true;
                i += 1;
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag: {flag}")),
            path => {
                if opts.base.is_some() {
                    return Err(format!("unexpected argument: {path}"));
                }
                opts.base = Some(PathBuf::from(path));
                i += 1;
            }
        }
    }

    Ok(opts)
}

fn base_path(opts: &Opts) -> Result<PathBuf, String> {
    opts.base
        .clone()
        .or_else(|| env::var_os(BASE_ENV).map(PathBuf::from))
        .ok_or_else(|| format!("no base file given and {BASE_ENV} is not set"))
}

fn load_store(opts: &Opts) -> Result<(PathBuf, MemoryStore), String> {
    let path = base_path(opts)?;
    let store = MemoryStore::load(&path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok((path, store))
}

fn table_arg(opts: &Opts) -> Result<&str, String> {
    opts.table
        .as_deref()
        .ok_or_else(|| "missing --table".to_string())
}

fn print_json(value: &serde_json::Value) -> Result<(), String> {
    println!(
        "{}",
        serde_json::to_string(value).map_err(|e| e.to_string())?
    );
    Ok(())
}

fn run_formats(args: &[String]) -> Result<(), String> {
    let opts = parse_flags(args)?;

    if opts.json {
        return print_json(&json!({
            "date_formats": DATE_FORMATS,
            "suffix_formats": SUFFIX_FORMATS,
        }));
    }

    println!("date formats:");
    for (i, f) in DATE_FORMATS.iter().enumerate() {
        println!("  {i}  {f}");
    }
    println!("suffix formats:");
    for (i, f) in SUFFIX_FORMATS.iter().enumerate() {
        println!("  {i}  {f}");
    }
    Ok(())
}

fn code_count(opts: &Opts) -> Result<usize, String> {
    match opts.count {
        None => Ok(1),
        Some(0) => Err("--count must be at least 1".to_string()),
        Some(n) => Ok(n),
    }
}

fn run_next(args: &[String]) -> Result<(), String> {
    let opts = parse_flags(args)?;
    let request = CodeRequest::new(
        opts.prefix.clone().unwrap_or_default(),
        opts.format.unwrap_or(0),
        opts.suffix.unwrap_or(0),
    );
    let mut generator = CodeGen::new(&request).map_err(|e| e.to_string())?;
    let codes = generator.next_n(code_count(&opts)?);

    if opts.json {
        return print_json(&json!({
            "date_format": generator.date_template().as_str(),
            "suffix_format": generator.suffix_format().as_str(),
            "codes": codes,
        }));
    }
    for code in codes {
        println!("{code}");
    }
    Ok(())
}

fn run_tables(args: &[String]) -> Result<(), String> {
    let opts = parse_flags(args)?;
    let (_, store) = load_store(&opts)?;
    let tables = block_on(store.list_tables()).map_err(|e| e.to_string())?;

    if opts.json {
        return print_json(&json!(tables));
    }
    for t in tables {
        println!("{}\t{}", t.id, t.name);
    }
    Ok(())
}

fn run_views(args: &[String]) -> Result<(), String> {
    let opts = parse_flags(args)?;
    let (_, store) = load_store(&opts)?;
    let views = block_on(grid_views(&store, table_arg(&opts)?)).map_err(|e| e.to_string())?;

    if opts.json {
        return print_json(&json!(views));
    }
    for v in views {
        println!("{}\t{}", v.id, v.name);
    }
    Ok(())
}

fn run_fields(args: &[String]) -> Result<(), String> {
    let opts = parse_flags(args)?;
    let (_, store) = load_store(&opts)?;
    let fields = block_on(text_fields(&store, table_arg(&opts)?)).map_err(|e| e.to_string())?;

    if opts.json {
        return print_json(&json!(fields));
    }
    for f in fields {
        println!("{}\t{}", f.id, f.name);
    }
    Ok(())
}

fn print_report(report: &BatchReport, json_out: bool, dry_run: bool) -> Result<(), String> {
    if json_out {
        let written: Vec<_> = report
            .written
            .iter()
            .map(|w| json!({ "record_id": w.record_id, "code": w.code }))
            .collect();
        return print_json(&json!({
            "ok": true,
            "dry_run": dry_run,
            "written": written,
            "skipped": report.skipped,
        }));
    }
    for w in &report.written {
        println!("{}\t{}", w.record_id, w.code);
    }
    println!(
        "written={} skipped={}{}",
        report.written.len(),
        report.skipped,
        if dry_run { " (dry run)" } else { "" }
    );
    Ok(())
}

fn run_apply(args: &[String]) -> Result<(), String> {
    let opts = parse_flags(args)?;
    let (path, store) = load_store(&opts)?;
    let form = CodeForm {
        table: opts.table.clone(),
        target_view: opts.view.clone(),
        target_field: opts.field.clone(),
        code_prefix: opts.prefix.clone(),
        code_format: opts.format,
        code_suffix: opts.suffix,
    };

    let outcome = block_on(submit(&store, &form, SystemClock));

    // partial writes still land in the file
    let landed = match &outcome {
        Ok(_) => true,
        Err(FormError::Batch(e @ BatchError::Write { .. })) => !e.written().is_empty(),
        Err(_) => false,
    };
    if landed && !opts.dry_run {
        store
            .save(&path)
            .map_err(|e| format!("{}: {e}", path.display()))?;
    }

    match outcome {
        Ok(report) => print_report(&report, opts.json, opts.dry_run),
        Err(FormError::Batch(BatchError::Write { written, failed })) => {
            for f in &failed {
                warn!("{f}");
            }
            Err(format!(
                "{} write(s) failed, {} landed",
                failed.len(),
                written.len()
            ))
        }
        Err(e) => Err(e.to_string()),
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        print_help();
        process::exit(2);
    }

    if args[0] == "-h" || args[0] == "--help" || args[0] == "help" {
        print_help();
        return;
    }

    let cmd = args[0].as_str();
    let rest = &args[1..];

    let res = match cmd {
        "formats" => run_formats(rest),
        "next" => run_next(rest),
        "tables" => run_tables(rest),
        "views" => run_views(rest),
        "fields" => run_fields(rest),
        "apply" => run_apply(rest),
        _ => Err(format!("unknown command: {}", cmd)),
    };

    if let Err(err) = res {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_apply_flags() {
        let opts = parse_flags(&strings(&[
            "base.json",
            "--table",
            "tbl",
            "--view",
            "viw",
            "--field",
            "fld",
            "--format",
            "4",
            "--suffix",
            "1",
            "--dry-run",
        ]))
        .unwrap();
        assert_eq!(opts.base, Some(PathBuf::from("base.json")));
        assert_eq!(opts.table.as_deref(), Some("tbl"));
        assert_eq!(opts.format, Some(4));
        assert_eq!(opts.suffix, Some(1));
        assert_eq!(opts.prefix, None);
        assert!(opts.dry_run);
        assert!(!opts.json);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_flags(&strings(&["--format", "x"])).is_err());
        assert!(parse_flags(&strings(&["--table"])).is_err());
        assert!(parse_flags(&strings(&["--bogus"])).is_err());
        assert!(parse_flags(&strings(&["a.json", "b.json"])).is_err());
    }

    #[test]
    fn test_count_defaults_to_one_and_rejects_zero() {
        assert_eq!(code_count(&parse_flags(&[]).unwrap()).unwrap(), 1);
        let opts = parse_flags(&strings(&["--count", "3"])).unwrap();
        assert_eq!(code_count(&opts).unwrap(), 3);
        let opts = parse_flags(&strings(&["--count", "0"])).unwrap();
        assert!(code_count(&opts).is_err());
    }

    #[test]
    fn test_empty_prefix_is_kept() {
        let opts = parse_flags(&strings(&["--prefix", ""])).unwrap();
        assert_eq!(opts.prefix.as_deref(), Some(""));
    }
}
