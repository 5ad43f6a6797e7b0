use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use datatest_stable::Utf8Path;
use oat::runtime::Machine;

#[derive(thiserror::Error, Debug)]
#[error("error(s) occured in pipeline datatest at {0}")]
pub struct DatatestError(Box<Utf8Path>);

#[derive(Clone, Default)]
struct SharedOut(Rc<RefCell<Vec<u8>>>);

impl Write for SharedOut {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A fixture has three `---`-separated sections: expected stdout, expected
/// top of stack (blank when the stack should be empty), and the program.
fn read_datatest(test_contents: &str) -> (String, String, String) {
    let mut stdout_section = vec![];
    let mut top_section = vec![];
    let mut source = String::new();

    #[derive(PartialEq, Eq, Debug, Default)]
    enum Section {
        #[default]
        Stdout,
        Top,
        Source,
    }
    let mut section = Section::default();

    for line in test_contents.lines() {
        if line.trim_start().starts_with("//") && section != Section::Source {
            // comment
            continue;
        }

        match section {
            Section::Stdout => match line {
                s if s.trim_end() == "---" => {
                    section = Section::Top;
                }
                osl => stdout_section.push(osl),
            },
            Section::Top => match line {
                s if s.trim_end() == "---" => {
                    section = Section::Source;
                }
                tsl => top_section.push(tsl),
            },
            Section::Source => {
                if !source.is_empty() {
                    source.push('\n');
                }
                source.push_str(line);
            }
        }
    }

    (
        stdout_section.join("\n"),
        top_section.join("\n"),
        source,
    )
}

fn pipeline_test(path: &Utf8Path, contents: String) -> datatest_stable::Result<()> {
    let (expected_stdout, expected_top, source) = read_datatest(&contents);

    let codes = oat::compile(path.as_str(), &source)
        .map_err(|err| format!("{path}: {err}"))?;
    let out = SharedOut::default();
    let mut machine = Machine::load(codes)?.with_output(Box::new(out.clone()));
    machine.run()?;

    let printed = String::from_utf8(out.0.borrow().clone())?;
    let stdout_error = if printed.trim_end() != expected_stdout.trim_end() {
        println!(
            "error in {path}: mismatched output\n\nGot:\n{}\n\nExpected:\n{}",
            printed.trim_end(),
            expected_stdout.trim_end()
        );
        true
    } else {
        false
    };

    let top = machine
        .top()
        .map(|value| machine.show(value))
        .unwrap_or_default();
    let top_error = if top.trim() != expected_top.trim() {
        println!(
            "error in {path}: mismatched top of stack\n\nGot:\n{}\n\nExpected:\n{}",
            top.trim(),
            expected_top.trim()
        );
        true
    } else {
        false
    };

    if stdout_error || top_error {
        Err(DatatestError(Box::from(path)))?
    } else {
        Ok(())
    }
}

datatest_stable::harness! {
    pipeline_test, "test_data", r".*\.oatd",
}
