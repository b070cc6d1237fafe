fn main() -> anyhow::Result<()> {
    screen_recorder_lib::run()
}
