mod common;
use common::rand_u;
use speechgram::Grammar;

fn main() {
    let grammar: Grammar = r#"
        #JSGF V1.0;
        grammar weather;

        public <query> = [please] (tell me | what is) the <what> [in <city>];
        <what> = weather/4/ | forecast/2/ | temperature/1/;
        <city> = paris | "new york" | tokyo{jp};
    "#
    .parse()
    .unwrap();

    let sentences = grammar.productions().unwrap();
    println!("{} sentences, for example:", sentences.len());
    for s in sentences.iter().take(5) {
        println!("  {}", s);
    }

    let mut buf = [0; 4096];
    let mut u = rand_u(&mut buf);
    println!("sampled:");
    for _ in 0..5 {
        println!("  {}", grammar.sample(&mut u).unwrap());
    }
}
