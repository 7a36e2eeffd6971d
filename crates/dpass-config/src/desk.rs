use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use dpass_schemas::{GateLayout, DEFAULT_GATES_PER_CATEGORY, MAX_GATES_PER_CATEGORY};
use serde_json::Value;

/// Every pointer [`DeskConfig::from_config_json`] reads.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/layout/palace_gates",
    "/layout/torchlight_gates",
    "/daemon/addr",
    "/daemon/bus_capacity",
];

const DEFAULT_ADDR: &str = "127.0.0.1:8898";
const DEFAULT_BUS_CAPACITY: u64 = 256;

/// Typed settings for the desk and its daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskConfig {
    pub layout: GateLayout,
    pub daemon_addr: SocketAddr,
    /// Buffered view updates per SSE subscriber.
    pub bus_capacity: usize,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            layout: GateLayout::default(),
            daemon_addr: SocketAddr::from(([127, 0, 0, 1], 8898)),
            bus_capacity: DEFAULT_BUS_CAPACITY as usize,
        }
    }
}

impl DeskConfig {
    /// Read settings from merged config JSON. Missing keys take defaults;
    /// present keys of the wrong type or out of range are errors.
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let palace = read_slots(v, "/layout/palace_gates")?;
        let torchlight = read_slots(v, "/layout/torchlight_gates")?;

        let addr_raw = read_str(v, "/daemon/addr")?.unwrap_or(DEFAULT_ADDR);
        let daemon_addr: SocketAddr = addr_raw
            .parse()
            .with_context(|| format!("CONFIG_INVALID /daemon/addr: not a socket address: {addr_raw}"))?;

        let bus_capacity = read_u64(v, "/daemon/bus_capacity")?.unwrap_or(DEFAULT_BUS_CAPACITY);
        if bus_capacity == 0 {
            bail!("CONFIG_INVALID /daemon/bus_capacity: must be at least 1");
        }

        Ok(Self {
            layout: GateLayout::new(palace, torchlight),
            daemon_addr,
            bus_capacity: usize::try_from(bus_capacity)
                .context("CONFIG_INVALID /daemon/bus_capacity: too large")?,
        })
    }
}

fn read_slots(v: &Value, ptr: &str) -> Result<u16> {
    let n = read_u64(v, ptr)?.unwrap_or(DEFAULT_GATES_PER_CATEGORY as u64);
    if n == 0 || n > MAX_GATES_PER_CATEGORY as u64 {
        bail!("CONFIG_INVALID {ptr}: gate count {n} outside 1..={MAX_GATES_PER_CATEGORY}");
    }
    Ok(n as u16)
}

fn read_u64(v: &Value, ptr: &str) -> Result<Option<u64>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(x) => match x.as_u64() {
            Some(n) => Ok(Some(n)),
            None => bail!("CONFIG_INVALID {ptr}: expected a non-negative integer, got {x}"),
        },
    }
}

fn read_str<'a>(v: &'a Value, ptr: &str) -> Result<Option<&'a str>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(x) => bail!("CONFIG_INVALID {ptr}: expected a string, got {x}"),
    }
}
