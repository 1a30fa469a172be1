use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::process::ExitCode {
    let code = nodeops_cli::run();
    std::process::ExitCode::from(u8::try_from(code).unwrap_or(1))
}
