fn main() {
    map_cleaner::cli::run();
}
