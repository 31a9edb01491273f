use demos::{permutation, DIGITS};

fn main() {
    let mut fiber = permutation(DIGITS, DIGITS.len());
    for result in &mut fiber {
        let line: Vec<String> = result.iter().map(|d| d.to_string()).collect();
        println!("{},", line.join(","));
    }
}
