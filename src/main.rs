use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rayon::prelude::*;
use s4pi_codecs::{
    Archive, CancellationToken, CreateOptions, GenericResource, LoadOptions, ManagerOptions, Package,
    ResourceKey, ResourceManager,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const USAGE: &str = "Usage: s4pi-codecs <command> [args]

Available commands:
  list <package>                    List resources and the codec that handles each
  inspect <package>                 Per-type counts and parse status
  fields <package> <key>            Show the content fields of one resource
  verify <path>                     Check that every resource re-encodes byte-for-byte
  repack <in> <out> [--compress]    Load every resource and write a new package
  factories                         Show registered codecs and priorities

Keys are written TTTTTTTT-GGGGGGGG-IIIIIIIIIIIIIIII.";

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let args: Vec<String> = std::env::args().collect();
    let Some(cmd) = args.get(1).map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };

    match cmd {
        "list" => run_list(Path::new(arg(&args, 2, "list <package>")?))?,
        "inspect" => run_inspect(Path::new(arg(&args, 2, "inspect <package>")?))?,
        "fields" => {
            let path = arg(&args, 2, "fields <package> <key>")?;
            let key: ResourceKey = arg(&args, 3, "fields <package> <key>")?
                .parse()
                .context("Invalid resource key")?;
            run_fields(Path::new(path), key)?;
        }
        "verify" => run_verify(Path::new(arg(&args, 2, "verify <path>")?))?,
        "repack" => {
            let input = arg(&args, 2, "repack <in> <out> [--compress]")?;
            let output = arg(&args, 3, "repack <in> <out> [--compress]")?;
            let compress = args.iter().any(|a| a == "--compress");
            run_repack(Path::new(input), Path::new(output), compress)?;
        }
        "factories" => run_factories()?,
        "--help" | "-h" | "help" => println!("{}", USAGE),
        _ => {
            println!("Unknown command: {}", cmd);
            println!("Run 's4pi-codecs --help' for usage information.");
        }
    }

    Ok(())
}

fn arg<'a>(args: &'a [String], i: usize, usage: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Usage: s4pi-codecs {}", usage))
}

fn manager(eager_parse: bool) -> Result<ResourceManager> {
    let options = ManagerOptions {
        maintenance_interval: None,
        eager_parse,
        ..ManagerOptions::from_env()
    };
    ResourceManager::new(options).context("Failed to set up codecs")
}

fn run_list(path: &Path) -> Result<()> {
    let manager = manager(false)?;
    let pkg = Package::open(path).with_context(|| format!("Failed to open {:?}", path))?;

    println!("{} resources in {:?}", pkg.resource_count(), path);
    for entry in &pkg.entries {
        let codec = manager.registry().resolve(entry.key.type_id)?.name();
        let compressed = if entry.is_compressed() { "zlib" } else { "-" };
        println!(
            "  {} | {:>10} bytes | {:>4} | {}",
            entry.key, entry.memsize, compressed, codec
        );
    }
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    info!("Inspecting: {:?}", path);
    let manager = manager(true)?;
    let pkg = Package::open(path).with_context(|| format!("Failed to open {:?}", path))?;

    #[derive(Default)]
    struct TypeSummary {
        count: usize,
        generic: bool,
        errors: Vec<String>,
    }

    let cancel = CancellationToken::new();
    let results = manager.load_all(&pkg, LoadOptions::default(), &cancel);
    let mut summary: BTreeMap<u32, TypeSummary> = BTreeMap::new();

    for (key, result) in results {
        let slot = summary.entry(key.type_id).or_default();
        slot.count += 1;
        match result {
            Ok(resource) => {
                if resource.read().format_name() == GenericResource::NAME {
                    slot.generic = true;
                }
            }
            Err(e) => {
                let e = anyhow::Error::from(e);
                warn!("Failed to parse {}: {:#}", key, e);
                slot.errors.push(format!("{}: {:#}", key, e));
            }
        }
    }

    println!("\nResource Type Summary:");
    for (type_id, s) in &summary {
        let codec = manager.registry().resolve(*type_id)?.name();
        let status = if !s.errors.is_empty() {
            format!("FAILED ({} errors, first at {})", s.errors.len(), s.errors[0])
        } else if s.generic {
            "GENERIC".to_string()
        } else {
            "KNOWN".to_string()
        };
        println!(
            "  Type: 0x{:08X} | Count: {:>5} | Codec: {:<14} | Status: {}",
            type_id, s.count, codec, status
        );
    }

    let metrics = manager.metrics();
    info!("{}", metrics);
    Ok(())
}

fn run_fields(path: &Path, key: ResourceKey) -> Result<()> {
    let manager = manager(false)?;
    let pkg = Package::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    if !pkg.contains(&key) {
        return Err(anyhow!("{} is not in {:?}", key, path));
    }

    let resource = manager.create_or_load(&pkg, key, LoadOptions::default(), &CancellationToken::new())?;
    let mut resource = resource.write();
    println!("{} ({})", key, resource.format_name());
    for (i, field) in resource.content_fields().iter().enumerate() {
        let access = if field.writable { "rw" } else { "ro" };
        match resource.get_field_at(i) {
            Ok(value) => println!("  [{}] {:<22} {} = {}", access, field.name, value.type_name(), value),
            Err(e) => println!("  [{}] {:<22} <error: {}>", access, field.name, e),
        }
    }
    Ok(())
}

#[derive(Default)]
struct VerifyStats {
    checked: usize,
    generic: usize,
    mismatched: usize,
    failed: usize,
}

fn verify_package(manager: &ResourceManager, path: &Path) -> Result<VerifyStats> {
    let pkg = Package::open(path)?;
    let options = CreateOptions {
        limits: manager.options().limits,
        eager: true,
    };

    let outcomes: Vec<Result<bool, ()>> = pkg
        .keys()
        .into_par_iter()
        .filter_map(|key| {
            let factory = manager.registry().factory_for(key.type_id)?;
            let outcome = (|| {
                let data = pkg.read_resource(&key)?;
                let mut resource = factory.create(key, data.clone(), &options)?;
                Ok::<_, s4pi_codecs::ResourceError>(resource.reserialize()? == data)
            })();
            Some(outcome.map_err(|e| {
                warn!("{:?} {}: {:#}", path, key, anyhow::Error::from(e));
            }))
        })
        .collect();

    let mut stats = VerifyStats {
        generic: pkg.resource_count() - outcomes.len(),
        ..VerifyStats::default()
    };
    for outcome in outcomes {
        match outcome {
            Ok(true) => stats.checked += 1,
            Ok(false) => stats.mismatched += 1,
            Err(_) => stats.failed += 1,
        }
    }
    Ok(stats)
}

fn run_verify(root: &Path) -> Result<()> {
    let manager = manager(true)?;

    let files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "package"))
        .collect();
    if files.is_empty() {
        warn!("No .package files found under {:?}", root);
        return Ok(());
    }
    info!("Verifying {} package(s)", files.len());

    let mut total = VerifyStats::default();
    let mut broken_files = 0;
    for path in &files {
        match verify_package(&manager, path) {
            Ok(stats) => {
                if stats.mismatched > 0 {
                    warn!("{:?}: {} resource(s) did not re-encode identically", path, stats.mismatched);
                }
                total.checked += stats.checked;
                total.generic += stats.generic;
                total.mismatched += stats.mismatched;
                total.failed += stats.failed;
            }
            Err(e) => {
                error!("Error opening {:?}: {:#}. Skipping.", path, e);
                broken_files += 1;
            }
        }
    }

    println!("\nVerification summary:");
    println!("  Packages:        {} ({} unreadable)", files.len(), broken_files);
    println!("  Identical:       {}", total.checked);
    println!("  Mismatched:      {}", total.mismatched);
    println!("  Failed to parse: {}", total.failed);
    println!("  Not decoded:     {}", total.generic);
    Ok(())
}

fn run_repack(input: &Path, output: &Path, compress: bool) -> Result<()> {
    let manager = manager(false)?;
    let pkg = Package::open(input).with_context(|| format!("Failed to open {:?}", input))?;

    let report = manager
        .repack(&pkg, output, compress, &CancellationToken::new())
        .with_context(|| format!("Failed to repack {:?} into {:?}", input, output))?;
    if report.copied > 0 {
        warn!(
            "{} resource(s) could not be decoded and were copied unchanged",
            report.copied
        );
    }
    println!("Re-encoded {}, copied {}", report.encoded, report.copied);
    Ok(())
}

fn run_factories() -> Result<()> {
    let manager = manager(false)?;
    if let Some(report) = manager.discovery() {
        println!("{}", report);
        for failure in &report.failures {
            println!("  {} failed: {}", failure.module, failure.reason);
        }
    }
    println!("\nRegistered codecs:");
    for reg in manager.registry().registrations() {
        println!("  0x{:08X} -> {:<14} (priority {})", reg.type_id, reg.factory, reg.priority);
    }
    let fallback = manager.registry().fallback()?;
    println!("  (anything else) -> {}", fallback.name());
    Ok(())
}
