fn main() -> anyhow::Result<()> {
    mage_encoder::run()
}
