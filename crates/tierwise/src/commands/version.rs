pub fn run() -> anyhow::Result<()> {
    println!("tierwise {}", env!("CARGO_PKG_VERSION"));
    println!("Self-learning flagship/lightweight model router");
    Ok(())
}
