//! Command handlers for the debugger shell.

use crate::error::ShellError;
use crate::params::{
    parse_interpretations, parse_run_parameters, parse_signers, split_signer_tail, take_flag,
    take_flag_value,
};
use crate::session::LoadOptions;
use crate::shell::{Shell, COMMANDS};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use neodbg_core::{UInt160, UInt256};
use neodbg_runtime::{syscall_name, Dao, NefFile, RuntimeError};
use neodbg_runtime::manifest::ContractManifest;
use neodbg_vm::VMState;
use serde::Deserialize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Routes a validated command to its handler.
pub fn dispatch<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    name: &str,
    arguments: &[String],
) -> Result<(), ShellError> {
    match name {
        "exit" => {
            shell.request_exit();
            Ok(())
        }
        "help" => help(shell),
        "ip" => ip(shell),
        "break" => break_command(shell, arguments),
        "jump" => jump(shell, arguments),
        "estack" => estack(shell),
        "istack" => istack(shell),
        "sslot" => slot_dump(shell, SlotKind::Static),
        "lslot" => slot_dump(shell, SlotKind::Local),
        "aslot" => slot_dump(shell, SlotKind::Arguments),
        "loadhex" => load_hex(shell, arguments),
        "loadbase64" => load_base64(shell, arguments),
        "loadnef" => load_nef(shell, arguments),
        "loadgo" => load_go(shell, arguments),
        "loadtx" => load_tx(shell, arguments),
        "loaddeployed" => load_deployed(shell, arguments),
        "reset" => {
            shell.session.reset();
            Ok(())
        }
        "parse" => parse(shell, arguments),
        "run" => run(shell, arguments),
        "cont" => cont(shell),
        "step" => step(shell, arguments),
        "stepinto" => step_into(shell),
        "stepout" => step_out(shell),
        "stepover" => step_over(shell),
        "ops" => ops(shell),
        "events" => events(shell),
        "env" => env(shell, arguments),
        "storage" => storage(shell, arguments),
        "changes" => changes(shell, arguments),
        "history" => history(shell),
        other => Err(ShellError::UnknownCommand(other.to_string())),
    }
}

fn help<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    writeln!(shell.writer, "Commands:")?;
    for meta in COMMANDS {
        writeln!(shell.writer, "  {:<70} {}", meta.usage, meta.help)?;
    }
    Ok(())
}

fn ip<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let engine = shell.session.engine()?;
    let context = engine.current_context().ok_or(ShellError::NoScript)?;
    let position = context.instruction_pointer();
    match context.current_instruction() {
        Ok(instruction) => writeln!(
            shell.writer,
            "instruction pointer at {position} ({})",
            instruction.opcode
        )?,
        Err(_) => writeln!(shell.writer, "instruction pointer at {position}")?,
    }
    Ok(())
}

fn break_command<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let position: usize = arguments[0]
        .parse()
        .map_err(|e| ShellError::bad_argument(format!("bad instruction offset: {e}")))?;
    shell.session.engine_mut()?.add_breakpoint(position)?;
    writeln!(shell.writer, "breakpoint added at instruction {position}")?;
    Ok(())
}

fn jump<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let position: i64 = arguments[0]
        .parse()
        .map_err(|e| ShellError::bad_argument(format!("bad instruction offset: {e}")))?;
    let engine = shell.session.engine_mut()?;
    engine
        .current_context_mut()
        .ok_or(ShellError::NoScript)?
        .jump(position)?;
    writeln!(shell.writer, "jumped to instruction {position}")?;
    Ok(())
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn estack<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let engine = shell.session.engine()?;
    let dump = match engine.current_context() {
        Some(context) => context.evaluation_stack().to_json(),
        None => engine.result_stack().to_json(),
    };
    writeln!(shell.writer, "{}", pretty(&dump))?;
    Ok(())
}

fn istack<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let engine = shell.session.engine()?;
    let frames: Vec<serde_json::Value> = engine
        .invocation_stack()
        .iter()
        .rev()
        .map(|frame| {
            let opcode = frame
                .current_instruction()
                .map(|instruction| instruction.opcode.name().to_string())
                .unwrap_or_else(|_| "RET".to_string());
            serde_json::json!({
                "scripthash": frame.script_hash().to_string(),
                "ip": frame.instruction_pointer(),
                "opcode": opcode,
                "stack": frame.evaluation_stack().len(),
            })
        })
        .collect();
    writeln!(shell.writer, "{}", pretty(&serde_json::Value::Array(frames)))?;
    Ok(())
}

enum SlotKind {
    Static,
    Local,
    Arguments,
}

fn slot_dump<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    kind: SlotKind,
) -> Result<(), ShellError> {
    let engine = shell.session.engine()?;
    let context = engine.current_context().ok_or(ShellError::NoScript)?;
    let dump = match kind {
        SlotKind::Static => context
            .static_fields()
            .map(|slot| slot.borrow().to_json()),
        SlotKind::Local => context.local_variables().map(|slot| slot.to_json()),
        SlotKind::Arguments => context.arguments().map(|slot| slot.to_json()),
    };
    match dump {
        Some(value) => writeln!(shell.writer, "{}", pretty(&value))?,
        None => writeln!(shell.writer, "[]")?,
    }
    Ok(())
}

/// Shared loader plumbing: strips `--historic`, `--gas` and the signer
/// tail out of the argument list.
struct LoaderArgs {
    positional: Vec<String>,
    signers: Vec<neodbg_core::Signer>,
    gas: Option<i64>,
    historic: Option<u32>,
}

fn loader_args<R: BufRead, W: Write>(
    shell: &Shell<R, W>,
    arguments: &[String],
) -> Result<LoaderArgs, ShellError> {
    let (head, tail) = split_signer_tail(arguments);
    let mut positional = head.to_vec();
    let historic = take_flag_value(&mut positional, "--historic")?
        .map(|value| {
            value
                .parse::<u32>()
                .map_err(|e| ShellError::bad_argument(format!("bad historic height: {e}")))
        })
        .transpose()?;
    let gas = take_flag_value(&mut positional, "--gas")?
        .map(|value| {
            value
                .parse::<i64>()
                .map_err(|e| ShellError::bad_argument(format!("bad gas amount: {e}")))
        })
        .transpose()?;
    let signers = parse_signers(tail, shell.session.config().protocol.address_version)?;
    Ok(LoaderArgs {
        positional,
        signers,
        gas,
        historic,
    })
}

fn finish_load<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    options: LoadOptions,
) -> Result<(), ShellError> {
    let instructions = shell.session.load(options)?;
    writeln!(shell.writer, "READY: loaded {instructions} instructions")?;
    Ok(())
}

fn load_hex<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let parsed = loader_args(shell, arguments)?;
    let data = parsed
        .positional
        .first()
        .ok_or(ShellError::MissingArgument("loadhex <hex>"))?;
    let script = hex::decode(data.strip_prefix("0x").unwrap_or(data))
        .map_err(|e| ShellError::bad_argument(format!("bad hex script: {e}")))?;
    finish_load(
        shell,
        LoadOptions {
            signers: parsed.signers,
            gas: parsed.gas,
            historic: parsed.historic,
            ..LoadOptions::raw(script)
        },
    )
}

fn load_base64<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let parsed = loader_args(shell, arguments)?;
    let data = parsed
        .positional
        .first()
        .ok_or(ShellError::MissingArgument("loadbase64 <base64>"))?;
    let script = BASE64
        .decode(data)
        .map_err(|e| ShellError::bad_argument(format!("bad base64 script: {e}")))?;
    finish_load(
        shell,
        LoadOptions {
            signers: parsed.signers,
            gas: parsed.gas,
            historic: parsed.historic,
            ..LoadOptions::raw(script)
        },
    )
}

fn manifest_path_for(nef_path: &Path) -> PathBuf {
    nef_path.with_extension("manifest.json")
}

fn load_nef_pair<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    nef_path: &Path,
    manifest_path: &Path,
    parsed: LoaderArgs,
) -> Result<(), ShellError> {
    let nef = NefFile::from_bytes(&std::fs::read(nef_path)?)?;
    let manifest = ContractManifest::from_json(&std::fs::read(manifest_path)?)
        .map_err(ShellError::Runtime)?;
    finish_load(
        shell,
        LoadOptions {
            tokens: nef.tokens.clone(),
            manifest: Some(manifest),
            signers: parsed.signers,
            gas: parsed.gas,
            historic: parsed.historic,
            ..LoadOptions::raw(nef.script)
        },
    )
}

fn load_nef<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let parsed = loader_args(shell, arguments)?;
    let nef_path = PathBuf::from(
        parsed
            .positional
            .first()
            .ok_or(ShellError::MissingArgument("loadnef <file.nef>"))?,
    );
    let manifest_path = parsed
        .positional
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest_path_for(&nef_path));
    load_nef_pair(shell, &nef_path, &manifest_path, parsed)
}

fn load_go<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let parsed = loader_args(shell, arguments)?;
    let source = PathBuf::from(
        parsed
            .positional
            .first()
            .ok_or(ShellError::MissingArgument("loadgo <file>"))?,
    );
    let Some(compiler) = shell.session.config().compiler.clone() else {
        return Err(ShellError::bad_argument("no source compiler configured"));
    };
    let mut words = compiler.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| ShellError::bad_argument("empty compiler command"))?;
    let status = std::process::Command::new(program)
        .args(words)
        .arg(&source)
        .status()?;
    if !status.success() {
        return Err(ShellError::bad_argument(format!(
            "compiler exited with {status}"
        )));
    }
    let nef_path = source.with_extension("nef");
    let manifest_path = manifest_path_for(&nef_path);
    load_nef_pair(shell, &nef_path, &manifest_path, parsed)
}

/// The parameter-context file shape `loadtx` accepts.
#[derive(Deserialize)]
struct ParameterContext {
    #[serde(rename = "type")]
    context_type: String,
    #[serde(alias = "data")]
    verifiable: String,
}

fn load_tx<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let parsed = loader_args(shell, arguments)?;
    let argument = parsed
        .positional
        .first()
        .ok_or(ShellError::MissingArgument("loadtx <hash|file>"))?
        .clone();

    let transaction = if Path::new(&argument).exists() {
        let text = std::fs::read_to_string(&argument)?;
        let context: ParameterContext = serde_json::from_str(&text)
            .map_err(|e| ShellError::bad_argument(format!("bad parameter context: {e}")))?;
        if !context.context_type.contains("Transaction") {
            return Err(ShellError::bad_argument(format!(
                "parameter context holds {}, not a transaction",
                context.context_type
            )));
        }
        let bytes = BASE64
            .decode(&context.verifiable)
            .map_err(|e| ShellError::bad_argument(format!("bad verifiable: {e}")))?;
        neodbg_core::Transaction::decode(&bytes)?
    } else {
        let found = UInt256::from_le_hex(&argument)
            .ok()
            .and_then(|hash| shell.session.ledger().transaction(&hash).cloned())
            .or_else(|| {
                UInt256::from_hex(&argument)
                    .ok()
                    .and_then(|hash| shell.session.ledger().transaction(&hash).cloned())
            });
        let (transaction, _height) = found.ok_or_else(|| {
            ShellError::Runtime(RuntimeError::TransactionNotFound {
                hash: argument.clone(),
            })
        })?;
        transaction
    };

    finish_load(
        shell,
        LoadOptions {
            container: Some(transaction.clone()),
            gas: parsed.gas,
            historic: parsed.historic,
            ..LoadOptions::raw(transaction.script)
        },
    )
}

fn load_deployed<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let parsed = loader_args(shell, arguments)?;
    let reference = parsed
        .positional
        .first()
        .ok_or(ShellError::MissingArgument("loaddeployed <hash|address|id>"))?
        .clone();

    let dao = match parsed.historic {
        Some(height) => Dao::new(shell.session.ledger().snapshot_store(height)?),
        None => shell.session.ledger().state_view(),
    };
    let contract = resolve_contract(shell, &dao, &reference)?;
    finish_load(
        shell,
        LoadOptions {
            owner: Some(contract.hash),
            tokens: contract.nef.tokens.clone(),
            manifest: Some(contract.manifest.clone()),
            signers: parsed.signers,
            gas: parsed.gas,
            historic: parsed.historic,
            ..LoadOptions::raw(contract.nef.script)
        },
    )
}

fn resolve_contract<R: BufRead, W: Write>(
    shell: &Shell<R, W>,
    dao: &Dao,
    reference: &str,
) -> Result<neodbg_runtime::ContractState, ShellError> {
    if let Ok(id) = reference.parse::<i32>() {
        return dao.get_contract_by_id(id).ok_or_else(|| {
            ShellError::Runtime(RuntimeError::ContractNotFound {
                hash: reference.to_string(),
            })
        });
    }
    let version = shell.session.config().protocol.address_version;
    let hash = UInt160::from_hex(reference)
        .or_else(|_| UInt160::from_address(reference, version))
        .map_err(|e| ShellError::bad_argument(format!("bad contract reference: {e}")))?;
    dao.get_contract(&hash).ok_or_else(|| {
        ShellError::Runtime(RuntimeError::ContractNotFound {
            hash: hash.to_string(),
        })
    })
}

fn parse<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let version = shell.session.config().protocol.address_version;
    let forms = parse_interpretations(&arguments[0], version);
    if forms.is_empty() {
        return Err(ShellError::bad_argument(format!(
            "no valid interpretation for {}",
            arguments[0]
        )));
    }
    for (label, value) in forms {
        writeln!(shell.writer, "{label}\t{value}")?;
    }
    Ok(())
}

fn run<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let version = shell.session.config().protocol.address_version;
    match arguments.split_first() {
        None => {}
        Some((method, rest)) if method == "_" => {
            let parameters = parse_run_parameters(rest, version)?;
            shell.session.push_run_parameters(parameters)?;
        }
        Some((method, rest)) => {
            let parameters = parse_run_parameters(rest, version)?;
            shell.session.prepare_method_call(method, parameters)?;
        }
    }
    let state = shell.session.continue_execution()?;
    report(shell, state)
}

fn cont<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let state = shell.session.continue_execution()?;
    report(shell, state)
}

fn step<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let count: usize = match arguments.first() {
        Some(value) => value
            .parse()
            .map_err(|e| ShellError::bad_argument(format!("bad step count: {e}")))?,
        None => 1,
    };
    if count == 0 {
        return Err(ShellError::bad_argument("step count must be positive"));
    }
    let engine = shell.session.engine_mut()?;
    engine.add_breakpoint_rel(count)?;
    let state = engine.continue_execution();
    report(shell, state)
}

fn step_into<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let state = shell.session.engine_mut()?.step_into();
    report(shell, state)
}

fn step_out<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let state = shell.session.engine_mut()?.step_out();
    report(shell, state)
}

fn step_over<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let state = shell.session.engine_mut()?.step_over();
    report(shell, state)
}

/// Prints the outcome of a run/cont/step and any accumulated events.
fn report<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    state: VMState,
) -> Result<(), ShellError> {
    match state {
        VMState::Break => {
            let engine = shell.session.engine()?;
            if let Some(context) = engine.current_context() {
                let position = context.instruction_pointer();
                match context.current_instruction() {
                    Ok(instruction) => writeln!(
                        shell.writer,
                        "at breakpoint {position} ({})",
                        instruction.opcode
                    )?,
                    Err(_) => writeln!(shell.writer, "at breakpoint {position}")?,
                }
            }
        }
        VMState::Halt => {
            writeln!(shell.writer, "execution has finished")?;
            let dump = shell.session.engine()?.result_stack().to_json();
            writeln!(shell.writer, "{}", pretty(&dump))?;
        }
        VMState::Fault => {
            let message = shell
                .session
                .engine()?
                .fault_message()
                .unwrap_or("execution faulted")
                .to_string();
            writeln!(shell.writer, "Error: {message}")?;
        }
        VMState::None => {}
    }
    if state.is_finished() {
        let notifications = shell.session.notifications();
        if !notifications.is_empty() {
            writeln!(shell.writer, "Events:")?;
            let events: Vec<serde_json::Value> =
                notifications.iter().map(|event| event.to_json()).collect();
            writeln!(shell.writer, "{}", pretty(&serde_json::Value::Array(events)))?;
        }
    }
    Ok(())
}

fn ops<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let script = shell.session.script()?.clone();
    let resolver = |id: u32| syscall_name(id).map(str::to_string);
    let listing = script.print_ops(Some(&resolver))?;
    write!(shell.writer, "{listing}")?;
    Ok(())
}

fn events<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let notifications = shell.session.notifications();
    let events: Vec<serde_json::Value> =
        notifications.iter().map(|event| event.to_json()).collect();
    writeln!(shell.writer, "{}", pretty(&serde_json::Value::Array(events)))?;
    Ok(())
}

fn env<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let chain_height = shell.session.ledger().height();
    let vm_height = shell
        .session
        .context()
        .map(|context| context.borrow().block_height)
        .unwrap_or(chain_height);
    let config = shell.session.config();
    writeln!(shell.writer, "Chain height: {chain_height}")?;
    writeln!(
        shell.writer,
        "VM height (may differ from chain height in case of historic call): {vm_height}"
    )?;
    writeln!(shell.writer, "Network magic: {}", config.protocol.network)?;
    writeln!(shell.writer, "DB type: {}", config.db_type)?;
    if arguments.first().is_some_and(|a| a == "-v") {
        let dump = serde_json::to_value(config)
            .map_err(|e| ShellError::bad_argument(e.to_string()))?;
        writeln!(shell.writer, "Node config:")?;
        writeln!(shell.writer, "{}", pretty(&dump))?;
    }
    Ok(())
}

fn storage<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let mut positional = arguments.to_vec();
    let backwards = take_flag(&mut positional, "--backwards");
    let diff = take_flag(&mut positional, "--diff");
    let reference = positional
        .first()
        .ok_or(ShellError::MissingArgument("storage <contract>"))?
        .clone();
    let prefix = match positional.get(1) {
        Some(text) => hex::decode(text.strip_prefix("0x").unwrap_or(text))
            .map_err(|e| ShellError::bad_argument(format!("bad prefix: {e}")))?,
        None => Vec::new(),
    };

    // Prefer the loaded script's overlay so pending writes are visible.
    let depth = usize::from(diff);
    let lines = match shell.session.context() {
        Ok(context) => {
            let context = context.borrow();
            let id = resolve_contract(shell, &context.dao, &reference)?.id;
            context.dao.find_storage(id, &prefix, backwards, depth)
        }
        Err(_) if diff => return Err(ShellError::NoScript),
        Err(_) => {
            let dao = shell.session.ledger().state_view();
            let id = resolve_contract(shell, &dao, &reference)?.id;
            dao.find_storage(id, &prefix, backwards, depth)
        }
    };
    for (key, value) in lines {
        writeln!(shell.writer, "{}: {}", hex::encode(key), hex::encode(value))?;
    }
    Ok(())
}

fn changes<R: BufRead, W: Write>(
    shell: &mut Shell<R, W>,
    arguments: &[String],
) -> Result<(), ShellError> {
    let context = shell.session.context()?;
    let context = context.borrow();
    let filter_id = match arguments.first() {
        Some(reference) => Some(resolve_contract(shell, &context.dao, reference)?.id),
        None => None,
    };
    let prefix = match arguments.get(1) {
        Some(text) => hex::decode(text.strip_prefix("0x").unwrap_or(text))
            .map_err(|e| ShellError::bad_argument(format!("bad prefix: {e}")))?,
        None => Vec::new(),
    };

    for item in context.dao.get_batch() {
        if item.key.len() < 4 {
            continue;
        }
        let id = i32::from_le_bytes([item.key[0], item.key[1], item.key[2], item.key[3]]);
        let user_key = &item.key[4..];
        if filter_id.is_some_and(|f| f != id) {
            continue;
        }
        if !user_key.starts_with(&prefix) {
            continue;
        }
        writeln!(shell.writer, "Contract ID: {id}")?;
        writeln!(shell.writer, "State: {}", item.state)?;
        writeln!(shell.writer, "Key: {}", hex::encode(user_key))?;
        if item.state != neodbg_store::TrackState::Deleted {
            writeln!(shell.writer, "Value: {}", hex::encode(&item.value))?;
        }
        writeln!(shell.writer)?;
    }
    Ok(())
}

fn history<R: BufRead, W: Write>(shell: &mut Shell<R, W>) -> Result<(), ShellError> {
    let lines: Vec<String> = shell.history().to_vec();
    for (index, line) in lines.iter().enumerate() {
        writeln!(shell.writer, "{index:4}  {line}")?;
    }
    Ok(())
}
