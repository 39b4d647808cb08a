fn main() -> anyhow::Result<()> {
    loadcast::run()
}
