use rustyline::{history::MemHistory, Config};
use yansi::Paint;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next() {
        Some(path) => run_file(&path),
        None => repl(),
    }
}

fn run_file(path: &str) -> anyhow::Result<()> {
    let src = std::fs::read_to_string(path)?;
    match oat::interpret(path, &src) {
        Ok(machine) => {
            if let Some(top) = machine.top() {
                println!("{}", machine.show(top).green());
            }
            Ok(())
        }
        Err(err) => {
            eprint!("{}", oat::diagnostics::report(&err, path, &src));
            std::process::exit(1);
        }
    }
}

fn repl() -> anyhow::Result<()> {
    let mut readline =
        rustyline::Editor::<(), _>::with_history(Config::default(), MemHistory::new())?;

    while let Ok(input) = readline.readline(">> ") {
        let src = input.as_str();

        // every line is its own little program
        match oat::interpret("repl.oat", src) {
            Ok(machine) => {
                if let Some(top) = machine.top() {
                    println!("{}", machine.show(top).cyan());
                }
            }
            Err(err) => print!("{}", oat::diagnostics::report(&err, "repl.oat", src)),
        }

        readline.add_history_entry(input)?;
    }

    Ok(())
}
