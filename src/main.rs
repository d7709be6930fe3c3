//! Command-line glue: read one `.inm` source file, compile it and drive the
//! external assembler and linker. Everything interesting happens in the
//! library; this file only does argument checking, file I/O and subprocess
//! plumbing, and maps any failure to a non-zero exit status.

use std::env;
use std::fs;
use std::process::{self, Command};

use initc::{Platform, compile};

fn main() {
  let args: Vec<String> = env::args().collect();
  if args.len() < 2 {
    let program = args.first().map(String::as_str).unwrap_or("initc");
    eprintln!("usage: {program} <input.inm> [linux|windows]");
    process::exit(1);
  }

  // The platform selector is validated before any compilation work.
  let platform = match args.get(2) {
    None => Platform::Linux,
    Some(name) => match Platform::from_name(name) {
      Some(platform) => platform,
      None => {
        eprintln!("unsupported platform \"{name}\", expected \"linux\" or \"windows\"");
        process::exit(1);
      }
    },
  };

  let source = match fs::read_to_string(&args[1]) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("cannot read {}: {err}", args[1]);
      process::exit(1);
    }
  };

  let asm = match compile(&source, platform) {
    Ok(asm) => asm,
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  };

  if let Err(err) = fs::write("output.asm", &asm) {
    eprintln!("cannot write output.asm: {err}");
    process::exit(1);
  }

  let format = match platform {
    Platform::Linux => "-felf64",
    Platform::Windows => "-fwin64",
  };
  run("nasm", &[format, "output.asm"]);

  // The Windows target stops after assembly: it has no link step yet.
  if platform == Platform::Linux {
    run("ld", &["-o", "output", "output.o"]);
  }
}

fn run(program: &str, args: &[&str]) {
  match Command::new(program).args(args).status() {
    Ok(status) if status.success() => {}
    Ok(status) => {
      eprintln!("{program} exited with {status}");
      process::exit(1);
    }
    Err(err) => {
      eprintln!("failed to run {program}: {err}");
      process::exit(1);
    }
  }
}
