fn main() {
    ergoweb::projects::cli::start_cli();
}
