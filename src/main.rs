fn main() -> anyhow::Result<()> {
    sidekick_admin_lib::run()
}
