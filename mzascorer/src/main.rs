use mzascorer::{MZAScorer, MZAScorerError};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<(), MZAScorerError> {
    let args = MZAScorer::from_command_line()?;
    let _guard = args.configure_logging()?;
    args.main()
}
