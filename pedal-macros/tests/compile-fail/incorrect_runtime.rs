extern crate pedal_macros;

// The runtime can only wrap an async function.
#[pedal_macros::runtime]
fn not_async() {
    println!("This is not allowed");
}
