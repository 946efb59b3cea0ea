use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

/// The scikit-learn English stop list.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
	"a","about","above","across","after","afterwards","again","against","all","almost","alone","along","already","also","although","always",
	"am","among","amongst","amoungst","amount","an","and","another","any","anyhow","anyone","anything","anyway","anywhere","are","around",
	"as","at","back","be","became","because","become","becomes","becoming","been","before","beforehand","behind","being","below","beside",
	"besides","between","beyond","bill","both","bottom","but","by","call","can","cannot","cant","co","con","could","couldnt",
	"cry","de","describe","detail","do","done","down","due","during","each","eg","eight","either","eleven","else","elsewhere",
	"empty","enough","etc","even","ever","every","everyone","everything","everywhere","except","few","fifteen","fifty","fill","find","fire",
	"first","five","for","former","formerly","forty","found","four","from","front","full","further","get","give","go","had",
	"has","hasnt","have","he","hence","her","here","hereafter","hereby","herein","hereupon","hers","herself","him","himself","his",
	"how","however","hundred","i","ie","if","in","inc","indeed","interest","into","is","it","its","itself","keep",
	"last","latter","latterly","least","less","ltd","made","many","may","me","meanwhile","might","mill","mine","more","moreover",
	"most","mostly","move","much","must","my","myself","name","namely","neither","never","nevertheless","next","nine","no","nobody",
	"none","noone","nor","not","nothing","now","nowhere","of","off","often","on","once","one","only","onto","or",
	"other","others","otherwise","our","ours","ourselves","out","over","own","part","per","perhaps","please","put","rather","re",
	"same","see","seem","seemed","seeming","seems","serious","several","she","should","show","side","since","sincere","six","sixty",
	"so","some","somehow","someone","something","sometime","sometimes","somewhere","still","such","system","take","ten","than","that","the",
	"their","them","themselves","then","thence","there","thereafter","thereby","therefore","therein","thereupon","these","they","thick","thin","third",
	"this","those","though","three","through","throughout","thru","thus","to","together","too","top","toward","towards","twelve","twenty",
	"two","un","under","until","up","upon","us","very","via","was","we","well","were","what","whatever","when",
	"whence","whenever","where","whereafter","whereas","whereby","wherein","whereupon","wherever","whether","which","while","whither","who","whoever","whole",
	"whom","whose","why","will","with","within","without","would","yet","you","your","yours","yourself","yourselves",
];

/// Build the analyzer used for both fitting and querying: split on
/// non-alphanumerics, lowercase, remove stop words.
pub fn build_analyzer(stop_words: bool) -> TextAnalyzer {
	let words: Vec<String> = if stop_words { ENGLISH_STOP_WORDS.iter().map(|s| s.to_string()).collect() } else { Vec::new() };
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(words))
		.build()
}

/// Run `text` through `analyzer`, keeping tokens of at least `min_len` chars.
pub fn tokenize(analyzer: &mut TextAnalyzer, text: &str, min_len: usize) -> Vec<String> {
	let mut stream = analyzer.token_stream(text);
	let mut tokens = Vec::new();
	while stream.advance() {
		let token = &stream.token().text;
		if token.chars().count() >= min_len { tokens.push(token.clone()); }
	}
	tokens
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn drops_stop_words_and_short_tokens() {
		let mut analyzer = build_analyzer(true);
		let tokens = tokenize(&mut analyzer, "The cat sat on a mat, x y", 2);
		assert_eq!(tokens, vec!["cat", "sat", "mat"]);
	}

	#[test]
	fn keeps_stop_words_when_disabled() {
		let mut analyzer = build_analyzer(false);
		let tokens = tokenize(&mut analyzer, "The Cat", 2);
		assert_eq!(tokens, vec!["the", "cat"]);
	}

	#[test]
	fn splits_on_punctuation_and_lowercases() {
		let mut analyzer = build_analyzer(true);
		let tokens = tokenize(&mut analyzer, "Quantum-Computing: HISTORY!", 2);
		assert_eq!(tokens, vec!["quantum", "computing", "history"]);
	}

	#[test]
	fn numerals_and_common_verbs_are_stopped() {
		let mut analyzer = build_analyzer(true);
		let tokens = tokenize(&mut analyzer, "first find one system to get two reactors", 2);
		assert_eq!(tokens, vec!["reactors"]);
	}

	#[test]
	fn long_tokens_are_kept() {
		let mut analyzer = build_analyzer(true);
		let long = "a".repeat(64);
		assert_eq!(tokenize(&mut analyzer, &long, 2), vec![long.clone()]);
	}
}
