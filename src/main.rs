// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! `mind-lazy`: inspect and exercise the lazy runtime's backend.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use mind_lazy::config::RuntimeConfig;
use mind_lazy::ir::{ops, post_order, EmissionSet};
use mind_lazy::logging::init_logging;
use mind_lazy::pipeline::LazyGraphExecutor;
use mind_lazy::runtime::{Backend, BackendRegistry, VirtualDevice};
use mind_lazy::types::{Scalar, ScalarType};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and exercise the MIND lazy tensor backend")]
struct Cli {
    /// Runtime configuration file (MindLazy.toml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the backend's devices.
    Devices {
        /// Emit JSON instead of text.
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Resolve a frontend device (lazy:N or kind:N) to a backend device.
    Map {
        #[arg(value_name = "DEVICE")]
        device: String,
    },
    /// Materialize a scalar constant through lower, compile and execute.
    Run {
        /// Constant value, e.g. 3.5, -2 or true.
        #[arg(long, allow_hyphen_values = true)]
        value: String,
        /// Element type (bool|u8|i32|i64|f32|f64).
        #[arg(long, default_value = "f32")]
        dtype: String,
        #[arg(long, default_value = "lazy:0")]
        device: String,
        /// Print the compiled computation before running it.
        #[arg(long, action = ArgAction::SetTrue)]
        dump: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    config.apply_env();
    init_logging(&config.logging).context("initializing logging")?;

    let registry = BackendRegistry::new();
    let backend = config.build_cpu_backend().context("configuring the interpreter backend")?;
    registry.register(Arc::new(backend))?;
    let executor = LazyGraphExecutor::from_registry(&registry)?;

    let outcome = match cli.command {
        Command::Devices { json } => list_devices(executor.backend().as_ref(), json),
        Command::Map { device } => map_device(executor.backend().as_ref(), &device),
        Command::Run {
            value,
            dtype,
            device,
            dump,
        } => run_constant(&executor, &value, &dtype, &device, dump),
    };
    executor.backend().prepare_to_exit()?;
    outcome
}

fn list_devices(backend: &dyn Backend, json: bool) -> Result<()> {
    let devices: Vec<String> = backend.devices().iter().map(ToString::to_string).collect();
    if json {
        let report = serde_json::json!({
            "backend": backend.name(),
            "default_device_type": backend.default_device_type(),
            "hardware_device_type": backend.hardware_device_type(),
            "devices": devices,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("backend: {}", backend.name());
    println!("default device type: {}", backend.default_device_type());
    for device in devices {
        println!("  {device}");
    }
    Ok(())
}

fn map_device(backend: &dyn Backend, device: &str) -> Result<()> {
    let virtual_device: VirtualDevice = device.parse()?;
    let mapped = backend.map_device(&virtual_device)?;
    println!("{virtual_device} -> {mapped}");
    Ok(())
}

fn run_constant(executor: &LazyGraphExecutor, value: &str, dtype: &str, device: &str, dump: bool) -> Result<()> {
    let scalar_type: ScalarType = dtype.parse()?;
    let scalar = parse_scalar(value, scalar_type)?;
    let virtual_device: VirtualDevice = device.parse()?;
    let node = ops::scalar_of_type(scalar, scalar_type);

    if dump {
        let backend = executor.backend();
        let target = backend.map_device(&virtual_device)?;
        let context = backend.create_lowering_context("run", &target, &post_order(&[node.clone()]), EmissionSet::new())?;
        let compiled = backend
            .compile(vec![context.build()?])
            .pop()
            .context("backend returned no computation")??;
        println!("{}", backend.computation_text(compiled.as_ref()));
    }

    let handles = executor.sync(&[node], &virtual_device)?;
    let Some(handle) = handles.first() else {
        bail!("execution produced no result");
    };
    let tensor = executor.materialize(handle, None)?;
    println!("{} = {}", tensor.shape(), tensor.item()?);
    Ok(())
}

fn parse_scalar(text: &str, scalar_type: ScalarType) -> Result<Scalar> {
    let text = text.trim();
    let scalar = match scalar_type {
        ScalarType::Bool => match text {
            "true" | "1" => Scalar::Bool(true),
            "false" | "0" => Scalar::Bool(false),
            _ => bail!("'{text}' is not a bool"),
        },
        ScalarType::F32 | ScalarType::F64 => {
            Scalar::Float(text.parse().with_context(|| format!("'{text}' is not a number"))?)
        }
        ScalarType::U8 | ScalarType::I32 | ScalarType::I64 => {
            Scalar::Int(text.parse().with_context(|| format!("'{text}' is not an integer"))?)
        }
    };
    Ok(scalar)
}
