use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pixels", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile an authoring graph into a dataset binary.
    Compile(CompileArgs),
    /// Print pool counts, section sizes and hashes of a compiled graph.
    Inspect(InspectArgs),
    /// Upload the compiled dataset to an in-process simulated die.
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
struct CompileArgs {
    /// Input authoring graph JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output dataset path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input authoring graph JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Input authoring graph JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Number of setup acknowledgements the simulated die swallows.
    #[arg(long, default_value_t = 0)]
    drop_setup_acks: u32,

    /// Transfer options JSON; missing fields take their defaults.
    #[arg(long)]
    opts: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Compile(args) => cmd_compile(args),
        Command::Inspect(args) => cmd_inspect(args),
        Command::Simulate(args) => cmd_simulate(args),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let f = File::open(path).with_context(|| format!("open {what} '{}'", path.display()))?;
    let r = BufReader::new(f);
    serde_json::from_reader(r).with_context(|| format!("parse {what} JSON"))
}

fn read_graph(path: &Path) -> anyhow::Result<pixels::DataSet> {
    let graph: pixels::EditDataSet = read_json(path, "graph")?;
    Ok(pixels::compile(&graph)?)
}

fn cmd_compile(args: CompileArgs) -> anyhow::Result<()> {
    let ds = read_graph(&args.in_path)?;
    let bytes = pixels::write_dataset(&ds);

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &bytes)
        .with_context(|| format!("write dataset '{}'", args.out.display()))?;

    eprintln!("wrote {} ({} bytes)", args.out.display(), bytes.len());
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let graph: pixels::EditDataSet = read_json(&args.in_path, "graph")?;
    let ds = pixels::compile(&graph)?;
    let bits = &ds.bits;

    println!("palette colors    {}", bits.palette.len());
    println!("rgb keyframes     {}", bits.rgb_keyframes.len());
    println!("rgb tracks        {}", bits.rgb_tracks.len());
    println!("keyframes         {}", bits.keyframes.len());
    println!("tracks            {}", bits.tracks.len());
    println!(
        "animations        {} ({} bytes)",
        ds.animations.len(),
        ds.animation_size()
    );
    println!(
        "conditions        {} ({} bytes)",
        ds.conditions.len(),
        ds.condition_size()
    );
    println!(
        "actions           {} ({} bytes)",
        ds.actions.len(),
        ds.action_size()
    );
    println!("rules             {}", ds.rules.len());
    println!("total size        {} bytes", pixels::compute_size(&ds));
    println!("dataset hash      {:08x}", pixels::dataset_hash(&ds));

    for (i, anim) in graph.animations.iter().enumerate() {
        let preview = pixels::compile_test_animation(anim)
            .with_context(|| format!("compile animation {i} '{}'", anim.name))?;
        println!(
            "animation {i:<3} {:<16} preview {} bytes, hash {:08x}",
            anim.name,
            pixels::compute_test_animation_size(&preview)?,
            pixels::test_animation_hash(&preview)?
        );
    }
    Ok(())
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let ds = read_graph(&args.in_path)?;
    let opts: pixels::TransferOpts = match &args.opts {
        Some(p) => read_json(p, "options")?,
        None => pixels::TransferOpts::default(),
    };
    let cfg = pixels::sim::SimConfig {
        drop_setup_acks: args.drop_setup_acks,
        ..Default::default()
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("build runtime")?;
    rt.block_on(async move {
        let (die, sim) = pixels::sim::SimulatedDie::connect(cfg, opts).await?;
        let mut last = 0u32;
        die.upload_dataset(&ds, |p| {
            let pct = (p * 100.0) as u32;
            if pct / 10 > last / 10 {
                eprintln!("  {pct:>3}%");
            }
            last = pct;
        })
        .await?;

        let stored = sim.dataset().map_or(0, |b| b.len());
        println!(
            "uploaded {} bytes in {} chunks, die hash {:08x}",
            stored,
            sim.count(pixels::MessageType::BulkData),
            die.identify().await?.data_set_hash
        );
        anyhow::Ok(())
    })
}
