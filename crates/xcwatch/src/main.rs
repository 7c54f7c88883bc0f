fn main() -> anyhow::Result<()> {
    xcwatch::run()
}
