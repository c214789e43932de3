fn main() {
    std::process::exit(mediscan_iq_lib::run());
}
