//! Shell-level scenario tests: literal command sequences against the REPL.

use neodbg_config::AppConfig;
use neodbg_core::UInt160;
use neodbg_runtime::manifest::{ContractManifest, ContractMethod};
use neodbg_runtime::{Ledger, NefFile};
use neodbg_shell::{DebugSession, Shell};
use std::io::Cursor;

fn run_script(commands: &str) -> String {
    run_script_with(commands, |_| {})
}

fn run_script_with(commands: &str, prepare: impl FnOnce(&mut Ledger)) -> String {
    let config = AppConfig::default();
    let mut session = DebugSession::new(config);
    prepare(session.ledger_mut());
    let reader = Cursor::new(commands.to_string());
    let mut shell = Shell::new(session, reader, Vec::new());
    let code = shell.run().unwrap();
    assert_eq!(code, 0);
    String::from_utf8(shell.writer).unwrap()
}

#[test]
fn two_pushes_and_an_add() {
    let output = run_script("loadhex 0x11129e\nrun\n");
    assert!(output.contains("READY: loaded 3 instructions"), "{output}");
    assert!(output.contains("execution has finished"), "{output}");
    assert!(output.contains("\"value\": 3"), "{output}");
}

#[test]
fn prompt_reflects_readiness() {
    let output = run_script("loadhex 11129e\n");
    // Unloaded prompt first, then the ip-bearing prompt.
    assert!(output.starts_with("NEO-GO-VM > "), "{output}");
    assert!(output.contains("NEO-GO-VM 0 > "), "{output}");
}

#[test]
fn breakpoint_stepping_scenario() {
    // PUSH1 PUSH2 ADD PUSH6 ADD with a breakpoint at the first ADD.
    let output = run_script("loadhex 11129e169e\nbreak 2\ncont\nestack\ncont\nestack\ncont\n");
    assert!(output.contains("breakpoint added at instruction 2"), "{output}");
    assert!(output.contains("at breakpoint 2 (ADD)"), "{output}");
    // First stop: [2, 1] on the stack.
    let first_stop = output.find("at breakpoint 2 (ADD)").unwrap();
    let after = &output[first_stop..];
    assert!(after.contains("\"value\": 2"), "{output}");
    assert!(after.contains("\"value\": 1"), "{output}");
    // Final run halts with 9.
    assert!(output.contains("execution has finished"), "{output}");
    assert!(output.contains("\"value\": 9"), "{output}");
}

#[test]
fn slots_after_initsslot() {
    // INITSSLOT 2; PUSH5; STSFLD1; LDSFLD1: break before LDSFLD1 (offset 4).
    let output = run_script("loadhex 5602156159\nbreak 4\ncont\nsslot\ncont\n");
    assert!(output.contains("at breakpoint 4 (LDSFLD1)"), "{output}");
    // The static slot shows [null, 5].
    let stop = output.find("at breakpoint").unwrap();
    let after = &output[stop..];
    assert!(after.contains("null"), "{output}");
    assert!(after.contains("\"value\": 5"), "{output}");
    assert!(output.contains("execution has finished"), "{output}");
}

#[test]
fn witness_scope_scenario() {
    let owner = UInt160::from_script(&[0x42]);
    let script = {
        let mut builder = neodbg_vm::ScriptBuilder::new();
        builder.emit_push_bytes(&owner.to_le_vec()).unwrap();
        builder.emit_syscall("System.Runtime.CheckWitness");
        hex::encode(builder.to_bytes())
    };
    let le_hex = hex::encode(owner.to_le_vec());

    // CalledByEntry (default scope): true.
    let output = run_script(&format!("loadhex {script} -- {le_hex}\nrun\n"));
    assert!(output.contains("\"value\": true"), "{output}");

    // Scope None: false.
    let output = run_script(&format!("loadhex {script} -- {le_hex}:None\nrun\n"));
    assert!(output.contains("\"value\": false"), "{output}");

    // A non-witnessing account: false.
    let other = hex::encode(UInt160::from_script(&[0x43]).to_le_vec());
    let output = run_script(&format!("loadhex {script} -- {other}:Global\nrun\n"));
    assert!(output.contains("\"value\": false"), "{output}");
}

fn deploy_storage_contract(ledger: &mut Ledger) -> (UInt160, i32) {
    let nef = NefFile::from_script("test", put_script_bytes()).unwrap();
    let contract = ledger
        .deploy_contract(nef, ContractManifest::new("S"))
        .unwrap();
    let id = contract.id;
    let hash = contract.hash;
    ledger
        .persist_block(Vec::new(), |dao| {
            dao.put_storage_item(id, &[1], vec![2]);
            dao.put_storage_item(id, &[2], vec![2]);
            Ok(())
        })
        .unwrap();
    (hash, id)
}

fn put_script_bytes() -> Vec<u8> {
    let mut builder = neodbg_vm::ScriptBuilder::new();
    builder.emit_push_bytes(&[3]).unwrap();
    builder.emit_push_bytes(&[3]).unwrap();
    builder.emit_syscall("System.Storage.GetContext");
    builder.emit_syscall("System.Storage.Put");
    builder.to_bytes()
}

#[test]
fn storage_diff_scenario() {
    // The contract hash is deterministic from the script bytes.
    let hash = UInt160::from_script(&put_script_bytes());
    let id = 1;
    let commands = format!(
        "loaddeployed {hash}\nrun\nstorage {hash}\nstorage {hash} --diff\nchanges {id}\n"
    );
    let output = run_script_with(&commands, |ledger| {
        deploy_storage_contract(ledger);
    });
    assert!(output.contains("execution has finished"), "{output}");
    // Full dump: all three entries.
    assert!(output.contains("01: 02"), "{output}");
    assert!(output.contains("02: 02"), "{output}");
    assert!(output.contains("03: 03"), "{output}");
    // Diff: only the new entry; changes reports one Added record.
    let diff_start = output.rfind("03: 03").unwrap();
    assert!(output[diff_start..].contains("Contract ID: 1"), "{output}");
    assert!(output[diff_start..].contains("State: Added"), "{output}");
    assert!(output[diff_start..].contains("Key: 03"), "{output}");
    assert!(output[diff_start..].contains("Value: 03"), "{output}");
}

fn get_script_bytes() -> Vec<u8> {
    let mut builder = neodbg_vm::ScriptBuilder::new();
    builder.emit_push_bytes(&[1]).unwrap();
    builder.emit_syscall("System.Storage.GetContext");
    builder.emit_syscall("System.Storage.Get");
    builder.to_bytes()
}

#[test]
fn historic_read_scenario() {
    // The contract stores [1] -> [1] at height 2 and updates it at height 4.
    let hash = UInt160::from_script(&get_script_bytes());
    let commands =
        format!("loaddeployed {hash} --historic 3\nrun\nreset\nloaddeployed {hash}\nrun\n");
    let output = run_script_with(&commands, |ledger| {
        let nef = NefFile::from_script("test", get_script_bytes()).unwrap();
        let contract = ledger
            .deploy_contract(nef, ContractManifest::new("H"))
            .unwrap();
        let id = contract.id;
        ledger
            .persist_block(Vec::new(), |dao| {
                dao.put_storage_item(id, &[1], vec![1]);
                Ok(())
            })
            .unwrap();
        ledger.persist_block(Vec::new(), |_| Ok(())).unwrap();
        ledger
            .persist_block(Vec::new(), |dao| {
                dao.put_storage_item(id, &[1], vec![2]);
                Ok(())
            })
            .unwrap();
    });

    // Base64 of [1] is "AQ==", of [2] is "Ag==".
    let historic_at = output.find("execution has finished").unwrap();
    assert!(output[historic_at..].contains("AQ=="), "{output}");
    let second = output.rfind("execution has finished").unwrap();
    assert!(output[second..].contains("Ag=="), "{output}");
}

#[test]
fn run_method_uses_manifest_offsets() {
    // Script: [0] PUSH1 RET; [2] PUSH2 RET: manifest maps "two" to offset 2.
    let output = run_script_with("loaddeployed 1\nrun two\n", |ledger| {
        let nef = NefFile::from_script("test", vec![0x11, 0x40, 0x12, 0x40]).unwrap();
        let mut manifest = ContractManifest::new("M");
        manifest.abi.methods.push(ContractMethod {
            name: "one".into(),
            parameters: Vec::new(),
            return_type: "Integer".into(),
            offset: 0,
            safe: true,
        });
        manifest.abi.methods.push(ContractMethod {
            name: "two".into(),
            parameters: Vec::new(),
            return_type: "Integer".into(),
            offset: 2,
            safe: true,
        });
        ledger.deploy_contract(nef, manifest).unwrap();
    });
    assert!(output.contains("execution has finished"), "{output}");
    assert!(output.contains("\"value\": 2"), "{output}");
    assert!(!output.contains("\"value\": 1"), "{output}");
}

#[test]
fn loadnef_files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let nef = NefFile::from_script("test-compiler", vec![0x11, 0x12, 0x9e]).unwrap();
    let nef_path = dir.path().join("contract.nef");
    std::fs::write(&nef_path, nef.to_bytes().unwrap()).unwrap();
    let manifest = ContractManifest::new("FilePair");
    let manifest_path = dir.path().join("contract.manifest.json");
    std::fs::write(&manifest_path, manifest.to_json_pretty().unwrap()).unwrap();

    let commands = format!(
        "loadnef {} {}\nrun\n",
        nef_path.display(),
        manifest_path.display()
    );
    let output = run_script(&commands);
    assert!(output.contains("READY: loaded 3 instructions"), "{output}");
    assert!(output.contains("\"value\": 3"), "{output}");
}

#[test]
fn loadnef_rejects_corrupt_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let nef = NefFile::from_script("test-compiler", vec![0x11]).unwrap();
    let mut bytes = nef.to_bytes().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    let nef_path = dir.path().join("broken.nef");
    std::fs::write(&nef_path, bytes).unwrap();
    std::fs::write(
        dir.path().join("broken.manifest.json"),
        ContractManifest::new("B").to_json_pretty().unwrap(),
    )
    .unwrap();

    let output = run_script(&format!("loadnef {}\nip\n", nef_path.display()));
    assert!(output.contains("Error:"), "{output}");
    assert!(output.contains("checksum mismatch"), "{output}");
    // The failed load left the shell unloaded; ip reports that.
    assert!(output.contains("no script is loaded"), "{output}");
}

#[test]
fn errors_do_not_terminate_the_loop() {
    let output = run_script("bogus\nloadhex zz\nloadhex 11\nrun\n");
    assert!(output.contains("Error: unknown command: bogus"), "{output}");
    assert!(output.contains("Error: can't parse argument"), "{output}");
    // The loop kept going and the final run succeeded.
    assert!(output.contains("execution has finished"), "{output}");
}

#[test]
fn fault_reports_instruction_and_mnemonic() {
    // PUSH1 ABORT
    let output = run_script("loadhex 1138\nrun\nestack\n");
    assert!(output.contains("Error: at instruction 1 (ABORT):"), "{output}");
    // The stack stays inspectable after the fault.
    assert!(output.contains("\"value\": 1"), "{output}");
}

#[test]
fn events_print_after_halt() {
    // Notify("Hi", 7): item, name, syscall
    let mut builder = neodbg_vm::ScriptBuilder::new();
    builder.emit_push_int(7).unwrap();
    builder.emit_push_string("Hi").unwrap();
    builder.emit_syscall("System.Runtime.Notify");
    let commands = format!("loadhex {}\nrun\n", hex::encode(builder.to_bytes()));
    let output = run_script(&commands);
    assert!(output.contains("Events:"), "{output}");
    assert!(output.contains("\"name\": \"Hi\""), "{output}");
}

#[test]
fn ops_disassembles_with_syscall_names() {
    let mut builder = neodbg_vm::ScriptBuilder::new();
    builder.emit_push_int(1).unwrap();
    builder.emit_syscall("System.Runtime.Log");
    let commands = format!("loadhex {}\nops\n", hex::encode(builder.to_bytes()));
    let output = run_script(&commands);
    assert!(output.contains("PUSH1"), "{output}");
    assert!(output.contains("SYSCALL\tSystem.Runtime.Log"), "{output}");
}

#[test]
fn env_reports_heights_and_magic() {
    let output = run_script("env\n");
    assert!(output.contains("Chain height: 0"), "{output}");
    assert!(
        output.contains("VM height (may differ from chain height in case of historic call): 0"),
        "{output}"
    );
    assert!(output.contains("Network magic: 42"), "{output}");
    assert!(output.contains("DB type: inmemory"), "{output}");
}

#[test]
fn step_commands_walk_the_script() {
    let output = run_script("loadhex 11129e\nstepinto\nip\nstep 2\n");
    assert!(output.contains("at breakpoint 1 (PUSH2)"), "{output}");
    assert!(output.contains("instruction pointer at 1 (PUSH2)"), "{output}");
}

#[test]
fn integer_round_trips_through_parse() {
    let output = run_script("parse 12345\n");
    let hex_line = output
        .lines()
        .find(|line| line.starts_with("Integer to Hex"))
        .unwrap();
    let hex_value = hex_line.split('\t').nth(1).unwrap();
    // Feed the hex back: it must decode to the original integer.
    let second = run_script(&format!("parse {hex_value}\n"));
    assert!(second.contains("12345"), "{second}");
}
